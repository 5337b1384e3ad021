use std::hash::Hash;
use std::time::Duration;

use crate::cache::Cache;
use crate::expiry::{Expiry, FixedTtl, FixedTti};
use crate::listener::{EvictionListener, FnListener};

/// Builder for configuring and constructing a [`Cache`].
///
/// # Example
/// ```
/// use cortado::CacheBuilder;
/// use std::time::Duration;
///
/// let cache: cortado::Cache<String, String> = CacheBuilder::new()
///     .time_to_live(Duration::from_secs(60))
///     .build();
/// ```
pub struct CacheBuilder<K, V> {
    num_shards: usize,
    expiry: Option<Box<dyn Expiry<K, V>>>,
    listener: Option<Box<dyn EvictionListener<K, V>>>,
}

impl<K: 'static, V: 'static> CacheBuilder<K, V> {
    pub fn new() -> Self {
        CacheBuilder {
            num_shards: 64,
            expiry: None,
            listener: None,
        }
    }

    /// Set the number of internal shards (must be a power of two; default: 64).
    pub fn num_shards(mut self, n: usize) -> Self {
        assert!(n > 0 && n.is_power_of_two(), "num_shards must be a power of two");
        self.num_shards = n;
        self
    }

    /// Each entry expires `ttl` after it was **written** (or replaced).
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        assert!(ttl > Duration::ZERO, "ttl must be positive");
        self.expiry = Some(Box::new(FixedTtl(ttl)));
        self
    }

    /// Each entry expires `tti` after it was **last accessed**.
    pub fn time_to_idle(mut self, tti: Duration) -> Self {
        assert!(tti > Duration::ZERO, "tti must be positive");
        self.expiry = Some(Box::new(FixedTti(tti)));
        self
    }

    /// Install a custom [`Expiry`] policy deciding per-entry lifetimes on
    /// creation, replacement, and read.
    ///
    /// # Example
    /// ```
    /// use cortado::expiry::Expiry;
    /// use cortado::CacheBuilder;
    /// use std::time::{Duration, Instant};
    ///
    /// struct ByValue;
    ///
    /// impl Expiry<u64, Duration> for ByValue {
    ///     fn expire_after_create(&self, _k: &u64, v: &Duration, _now: Instant)
    ///         -> Option<Duration>
    ///     {
    ///         Some(*v) // the value itself carries its lifetime
    ///     }
    /// }
    ///
    /// let cache: cortado::Cache<u64, Duration> = CacheBuilder::new()
    ///     .expiry(ByValue)
    ///     .build();
    /// ```
    pub fn expiry<E: Expiry<K, V> + 'static>(mut self, e: E) -> Self {
        self.expiry = Some(Box::new(e));
        self
    }

    /// Register an eviction listener closure.
    ///
    /// The closure is called **synchronously on the maintenance path** each
    /// time an entry is removed for any reason (expiry or explicit
    /// invalidation).  Do **not** call cache methods from within the closure.
    ///
    /// # Example
    /// ```
    /// use cortado::CacheBuilder;
    /// use cortado::listener::EvictionCause;
    ///
    /// let cache: cortado::Cache<u64, u64> = CacheBuilder::new()
    ///     .eviction_listener(|key: &u64, _val, cause| {
    ///         println!("evicted key={key} cause={cause:?}");
    ///     })
    ///     .build();
    /// ```
    pub fn eviction_listener<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, std::sync::Arc<V>, crate::listener::EvictionCause) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(FnListener(f)));
        self
    }

    /// Register an eviction listener via the [`EvictionListener`] trait.
    pub fn eviction_listener_impl<L: EvictionListener<K, V>>(mut self, l: L) -> Self {
        self.listener = Some(Box::new(l));
        self
    }
}

impl<K: 'static, V: 'static> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn build(self) -> Cache<K, V> {
        Cache::new(self.num_shards, self.expiry, self.listener)
    }
}
