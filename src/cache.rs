use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::buffer::write::{WriteBuffer, WriteOp};
use crate::builder::CacheBuilder;
use crate::expiry::timer_wheel::TimerWheel;
use crate::expiry::Expiry;
use crate::listener::{EvictionCause, EvictionListener};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::store::sharded::{ShardedStore, NEVER};

/// Every N-th read attempts a maintenance pass, so wheel sweeps keep
/// happening on read-heavy workloads whose reads produce no write ops.
const READ_MAINTENANCE_STRIDE: u64 = 64;

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// Shared interior of a [`Cache`].
pub(crate) struct Inner<K, V> {
    pub(crate) store: ShardedStore<K, V>,
    /// `None` disables expiration entirely: the timer wheel is never touched
    /// and every entry is immortal.
    pub(crate) expiry: Option<Box<dyn Expiry<K, V>>>,
    pub(crate) timer: Mutex<TimerWheel<K>>,
    pub(crate) epoch: Instant,
    /// Optional eviction listener.  `None` if the user didn't register one.
    pub(crate) listener: Option<Box<dyn EvictionListener<K, V>>>,
    pub(crate) write_buf: WriteBuffer<K>,
    pub(crate) maintain_lock: Mutex<()>,
    pub(crate) metrics: StatsCounter,
    /// Read counter driving [`READ_MAINTENANCE_STRIDE`].
    pub(crate) read_ops: AtomicU64,
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A concurrent in-memory cache whose entry lifetimes are enforced by a
/// hierarchical timer wheel.
///
/// Expiration deadlines are computed by an [`Expiry`] policy (fixed TTL/TTI
/// or a custom strategy) and checked inline on every read; the wheel sweeps
/// lazily during maintenance passes piggy-backed on normal operations, so no
/// background thread is involved.
///
/// # Example
/// ```
/// use cortado::CacheBuilder;
/// use std::time::Duration;
///
/// let cache: cortado::Cache<String, String> = CacheBuilder::new()
///     .time_to_live(Duration::from_secs(60))
///     .build();
/// cache.insert("hello".to_string(), "world".to_string());
/// assert_eq!(
///     cache.get(&"hello".to_string()),
///     Some(std::sync::Arc::new("world".to_string()))
/// );
/// ```
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        num_shards: usize,
        expiry: Option<Box<dyn Expiry<K, V>>>,
        listener: Option<Box<dyn EvictionListener<K, V>>>,
    ) -> Self {
        Cache {
            inner: Arc::new(Inner {
                store: ShardedStore::new(num_shards),
                expiry,
                timer: Mutex::new(TimerWheel::new(0)),
                epoch: Instant::now(),
                listener,
                write_buf: WriteBuffer::new(),
                maintain_lock: Mutex::new(()),
                metrics: StatsCounter::new(),
                read_ops: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a [`CacheBuilder`] for constructing a new cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    // -----------------------------------------------------------------------
    // Time helpers
    // -----------------------------------------------------------------------

    #[inline]
    fn now_nanos(&self) -> u64 {
        self.inner.epoch.elapsed().as_nanos() as u64
    }

    /// Turns a policy-supplied duration into an absolute deadline.
    ///
    /// `None` maps to [`NEVER`]; arithmetic saturates, and a zero duration
    /// (a policy contract violation) is clamped to the smallest positive
    /// delay so the entry stays schedulable.
    #[inline]
    fn deadline(now: u64, duration: Option<Duration>) -> u64 {
        match duration {
            None => NEVER,
            Some(d) => {
                let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
                now.saturating_add(nanos.max(1))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Hot-path: get
    // -----------------------------------------------------------------------

    /// Returns the value for `key` if it exists and has not expired.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let now = self.now_nanos();
        let Some((value, expires_at)) = self.inner.store.get_entry(key) else {
            self.inner.metrics.record_miss();
            return None;
        };

        // Inline expiry check — no timer-wheel lock required.
        if now >= expires_at {
            if let Some(value) = self.inner.store.remove(key) {
                self.inner.metrics.record_expiration(1);
                self.push_op(WriteOp::Remove { key: key.clone() });
                if let Some(listener) = &self.inner.listener {
                    listener.on_evict(key, value, EvictionCause::Expired);
                }
            }
            self.inner.metrics.record_miss();
            return None;
        }

        self.inner.metrics.record_hit();

        if let Some(policy) = &self.inner.expiry {
            // Let the policy extend (or shorten) the remaining lifetime.
            let current = Duration::from_nanos(expires_at.saturating_sub(now));
            let renewed = policy.expire_after_read(key, &value, Instant::now(), current);
            if renewed != Some(current) {
                let expires_at = Self::deadline(now, renewed);
                self.inner.store.update_expiry(key, expires_at);
                self.push_op(WriteOp::Schedule {
                    key: key.clone(),
                    expires_at,
                });
            }

            // Reads amortize wheel sweeps the same way writes do.
            let reads = self.inner.read_ops.fetch_add(1, Ordering::Relaxed);
            if reads % READ_MAINTENANCE_STRIDE == 0 {
                self.try_maintain();
            }
        }

        Some(value)
    }

    // -----------------------------------------------------------------------
    // Hot-path: insert
    // -----------------------------------------------------------------------

    /// Inserts `value` for `key`.  If the key already exists the value is
    /// replaced and the expiry policy's update hook decides the new
    /// deadline.
    pub fn insert(&self, key: K, value: V) {
        let now = self.now_nanos();
        let expires_at = match &self.inner.expiry {
            None => NEVER,
            Some(policy) => {
                let duration = match self.inner.store.get_entry(&key) {
                    Some((_, old_deadline)) => policy.expire_after_update(
                        &key,
                        &value,
                        Instant::now(),
                        Duration::from_nanos(old_deadline.saturating_sub(now)),
                    ),
                    None => policy.expire_after_create(&key, &value, Instant::now()),
                };
                Self::deadline(now, duration)
            }
        };

        self.inner.store.insert(key.clone(), value, expires_at);

        if self.inner.expiry.is_some() {
            self.push_op(WriteOp::Schedule { key, expires_at });
        }
    }

    // -----------------------------------------------------------------------
    // Hot-path: invalidate
    // -----------------------------------------------------------------------

    /// Removes the entry for `key`, if present.
    pub fn invalidate(&self, key: &K) {
        if let Some(value) = self.inner.store.remove(key) {
            if self.inner.expiry.is_some() {
                self.push_op(WriteOp::Remove { key: key.clone() });
            }
            if let Some(listener) = &self.inner.listener {
                listener.on_evict(key, value, EvictionCause::Explicit);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Enqueues a wheel operation, falling back to synchronous application
    /// when the buffer is full.  Scheduling work is never dropped: a lost
    /// op would leave the wheel pointing at a stale deadline forever.
    fn push_op(&self, op: WriteOp<K>) {
        match self.inner.write_buf.push(op) {
            Ok(()) => self.try_maintain(),
            Err(op) => self.apply_ops_sync(op),
        }
    }

    fn try_maintain(&self) {
        let Some(_guard) = self.inner.maintain_lock.try_lock() else { return };
        self.do_maintain();
    }

    fn do_maintain(&self) {
        let mut ops: Vec<WriteOp<K>> = Vec::new();
        self.inner.write_buf.drain(&mut ops);
        if self.inner.expiry.is_none() {
            return;
        }

        let now = self.now_nanos();
        let mut expired: Vec<(K, Arc<V>)> = Vec::new();
        {
            let store = &self.inner.store;
            let mut timer = self.inner.timer.lock();

            for op in ops {
                Self::apply_op(store, &mut timer, op);
            }

            // Sweep the wheel.  The store's deadline is canonical: a node
            // whose deadline was pushed out by a read we have not applied
            // yet is refused and re-homed by its queued Schedule op.
            timer.advance(now, |key, _node_deadline| match store.get_entry(key) {
                Some((_, expires_at)) if expires_at > now => false,
                Some(_) => {
                    if let Some(value) = store.remove(key) {
                        expired.push((key.clone(), value));
                    }
                    true
                }
                None => true,
            });
        }

        // Fire the listener outside the wheel lock.
        if !expired.is_empty() {
            self.inner.metrics.record_expiration(expired.len() as u64);
            if let Some(listener) = &self.inner.listener {
                for (key, value) in expired {
                    listener.on_evict(&key, value, EvictionCause::Expired);
                }
            }
        }
    }

    /// Applies the full backlog plus `op` under the wheel lock, without
    /// sweeping.  Used when the write buffer overflows.
    fn apply_ops_sync(&self, op: WriteOp<K>) {
        let mut pending: Vec<WriteOp<K>> = Vec::new();
        self.inner.write_buf.drain(&mut pending);
        pending.push(op);

        let store = &self.inner.store;
        let mut timer = self.inner.timer.lock();
        for op in pending {
            Self::apply_op(store, &mut timer, op);
        }
    }

    fn apply_op(store: &ShardedStore<K, V>, timer: &mut TimerWheel<K>, op: WriteOp<K>) {
        match op {
            WriteOp::Schedule { key, expires_at } => {
                // The entry may have been invalidated behind this op.
                if store.contains(&key) {
                    timer.schedule(key, expires_at);
                } else {
                    timer.deschedule(&key);
                }
            }
            WriteOp::Remove { key } => {
                timer.deschedule(&key);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Bulk / admin operations
    // -----------------------------------------------------------------------

    /// Removes all entries.
    pub fn invalidate_all(&self) {
        if self.inner.listener.is_some() {
            // We need the values to fire the listener; collect key-by-key.
            // For invalidate_all we accept the O(n) cost.
            let keys: Vec<K> = {
                let mut ks = Vec::new();
                for shard in self.inner.store.shards() {
                    for key in shard.map.read().keys() {
                        ks.push(key.clone());
                    }
                }
                ks
            };
            for key in keys {
                if let Some(value) = self.inner.store.remove(&key) {
                    self.inner.listener.as_ref().unwrap().on_evict(
                        &key,
                        value,
                        EvictionCause::Explicit,
                    );
                }
            }
        } else {
            self.inner.store.clear();
        }

        if self.inner.expiry.is_some() {
            let mut discarded: Vec<WriteOp<K>> = Vec::new();
            self.inner.write_buf.drain(&mut discarded);
            *self.inner.timer.lock() = TimerWheel::new(self.now_nanos());
            log::debug!("cache cleared, timer wheel reset");
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Metrics {
        self.inner.metrics.snapshot()
    }

    /// Number of entries in the store.  May include expired entries that no
    /// sweep or read has reclaimed yet.
    pub fn entry_count(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Returns `true` if `key` is present and not past its deadline.
    pub fn contains(&self, key: &K) -> bool {
        match self.inner.store.get_entry(key) {
            Some((_, expires_at)) => self.now_nanos() < expires_at,
            None => false,
        }
    }
}
