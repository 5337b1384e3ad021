//! Hierarchical timer wheel for TTL / TTI expiry.
//!
//! ## Algorithm
//!
//! The wheel has **5 levels**, each composed of a fixed number of buckets.
//! Every level covers a geometrically larger time range:
//!
//! | Level | Buckets | Bucket span      | Total range   |
//! |-------|---------|------------------|---------------|
//! | 0     | 64      | ~1.07 s          | ~68 s         |
//! | 1     | 64      | ~1.14 min        | ~73 min       |
//! | 2     | 32      | ~1.22 hr         | ~39 hr        |
//! | 3     | 4       | ~1.63 d          | ~6.5 d        |
//! | 4     | 1       | ∞  (catch-all)   | unbounded     |
//!
//! Each bucket is a circular doubly-linked list threaded through a node
//! arena ([`NodeArena`]); the bucket's sentinel is an arena slot of its own,
//! so an empty bucket is simply a self-linked sentinel.
//!
//! ### Scheduling
//!
//! `schedule(key, expire_nanos)` places a node in the *finest* level whose
//! total span still covers the remaining delay, at the bucket the deadline's
//! timestamp falls into (shift/mask; every bucket count is a power of two).
//! A key is resident in at most one bucket: scheduling again first unlinks
//! the previous node.  Deadlines at or before the cursor land in the
//! cursor's own bucket, which is the first one the next sweep processes.
//!
//! ### Advancing
//!
//! `advance(now_nanos, evict)` walks every level from finest to coarsest and
//! processes each bucket whose window elapsed since the previous call, at
//! most one full revolution per level.  A bucket's member chain is captured
//! and the sentinel reset before any node is visited, so a panicking
//! predicate never leaves a half-linked bucket.  For every captured node:
//!
//! - deadline ≤ `now`: the node is offered to the eviction predicate.
//!   `true` consumes it; `false` re-enqueues it for its (unchanged)
//!   deadline.
//! - deadline > `now`: the bucket's coarse window elapsed early, so the
//!   node **cascades** into the finer-grained bucket matching its remaining
//!   delay.
//!
//! Nodes are delivered in bucket-traversal order (oldest-linked first,
//! finest level first), not sorted by deadline.
//!
//! The wheel is not internally synchronized: callers serialize `schedule`,
//! `deschedule`, and `advance` (the cache keeps it behind a mutex on the
//! maintenance path).
//!
//! ## References
//! - Varghese & Lauck (1987). *Hashed and Hierarchical Timing Wheels.*

use std::fmt;
use std::hash::Hash;

use ahash::AHashMap;

use super::list::{NodeArena, NIL};

// ---------------------------------------------------------------------------
// Wheel geometry (powers-of-two bucket spans)
// ---------------------------------------------------------------------------

const NANOS_PER_SEC: u64 = 1_000_000_000;

const LEVELS: usize = 5;

/// Number of buckets per level.  Each count is a power of two.
const BUCKETS: [usize; LEVELS] = [64, 64, 32, 4, 1];

/// Bucket span in nanoseconds for each level.
///
/// Each value is the next power of two above the corresponding real-time
/// unit; the sixth entry duplicates the catch-all span so that level
/// selection can always look one slot ahead.
const SPANS: [u64; LEVELS + 1] = [
    NANOS_PER_SEC.next_power_of_two(),            // Level 0: 2^30 ≈ 1.07 s
    (60 * NANOS_PER_SEC).next_power_of_two(),     // Level 1: 2^36 ≈ 1.14 min
    (3_600 * NANOS_PER_SEC).next_power_of_two(),  // Level 2: 2^42 ≈ 1.22 hr
    (86_400 * NANOS_PER_SEC).next_power_of_two(), // Level 3: 2^47 ≈ 1.63 d
    (BUCKETS[3] as u64) * (86_400 * NANOS_PER_SEC).next_power_of_two(), // 2^49 ≈ 6.5 d
    (BUCKETS[3] as u64) * (86_400 * NANOS_PER_SEC).next_power_of_two(), // sentinel
];

/// Bit shift turning a nanosecond timestamp into a tick at each level.
const SHIFT: [u32; LEVELS] = [
    SPANS[0].trailing_zeros(),
    SPANS[1].trailing_zeros(),
    SPANS[2].trailing_zeros(),
    SPANS[3].trailing_zeros(),
    SPANS[4].trailing_zeros(),
];

/// Arena index of the first sentinel of each level.
const OFFSET: [usize; LEVELS] = [0, 64, 128, 160, 164];

/// Total sentinel slots: one per bucket across all levels.
const SENTINEL_COUNT: usize = 165;

#[inline]
const fn sentinel_of(level: usize, bucket: usize) -> usize {
    OFFSET[level] + bucket
}

// ---------------------------------------------------------------------------
// TimerWheel
// ---------------------------------------------------------------------------

/// A hierarchical timer wheel scheduling cache-entry expirations.
///
/// All times are expressed as **nanoseconds since an arbitrary epoch** — the
/// caller is responsible for passing a consistent, monotonically
/// non-decreasing clock (e.g. `Instant::now().duration_since(start)` as
/// nanos).  Deadline arithmetic saturates, so `u64::MAX` behaves as
/// "never expires" and simply parks in the catch-all level.
pub struct TimerWheel<K> {
    arena: NodeArena<K>,
    /// `key → arena slot` for every resident timer.  Enforces the
    /// one-node-per-key invariant and gives O(1) deschedule.
    index: AHashMap<K, usize>,
    /// Wall-clock time at the last `advance` call, in nanos since epoch.
    nanos: u64,
}

impl<K: Hash + Eq + Clone> TimerWheel<K> {
    /// Creates a new wheel anchored at `start_nanos`.
    pub fn new(start_nanos: u64) -> Self {
        log::debug!(
            "timer wheel initialized: {} levels, finest span {}ns, horizon {}ns",
            LEVELS,
            SPANS[0],
            SPANS[LEVELS - 1],
        );
        TimerWheel {
            arena: NodeArena::new(SENTINEL_COUNT),
            index: AHashMap::new(),
            nanos: start_nanos,
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Returns the sentinel of the bucket a deadline belongs in: the finest
    /// level whose total span covers the remaining delay, else the
    /// catch-all.
    fn find_bucket(&self, expire: u64) -> usize {
        let duration = expire.saturating_sub(self.nanos);
        // An overdue deadline is placed at the cursor's own tick so the next
        // effective sweep picks it up first.
        let time = expire.max(self.nanos);
        for level in 0..LEVELS - 1 {
            if duration < SPANS[level + 1] {
                let ticks = time >> SHIFT[level];
                let bucket = ticks as usize & (BUCKETS[level] - 1);
                return sentinel_of(level, bucket);
            }
        }
        sentinel_of(LEVELS - 1, 0)
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Schedules `key` to expire at `expire_nanos`.
    ///
    /// If the key is already scheduled its previous node is unlinked first,
    /// so a key occupies at most one bucket.  A deadline at or before the
    /// current cursor is still schedulable and will be offered to the
    /// predicate by the next effective [`advance`](TimerWheel::advance).
    pub fn schedule(&mut self, key: K, expire_nanos: u64) {
        self.deschedule(&key);
        let idx = self.arena.alloc(key.clone(), expire_nanos);
        let bucket = self.find_bucket(expire_nanos);
        self.arena.link_before(bucket, idx);
        self.index.insert(key, idx);
    }

    /// Cancels the scheduled expiry for `key`.
    ///
    /// O(1): the node is unlinked through its own links and its slot
    /// recycled.  Returns `true` if the key was scheduled.
    pub fn deschedule(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.arena.unlink(idx);
                self.arena.free(idx);
                true
            }
            None => false,
        }
    }

    /// Advances the wheel to `now_nanos`, offering every due timer to
    /// `evict`.
    ///
    /// The predicate receives the key and the node's deadline.  Returning
    /// `true` means the caller disposed of the entry: the wheel drops the
    /// node and never touches it again.  Returning `false` leaves the entry
    /// resident; the wheel re-enqueues the node for its known deadline.
    ///
    /// Calling with `now_nanos` not greater than the cursor is a no-op.
    /// A single call processes each bucket at most once, even when the jump
    /// exceeds a level's full revolution.  A panic in the predicate
    /// propagates: buckets already swept stay swept and the cursor keeps its
    /// new value; there is no rollback.
    pub fn advance<F>(&mut self, now_nanos: u64, mut evict: F)
    where
        F: FnMut(&K, u64) -> bool,
    {
        if now_nanos <= self.nanos {
            return;
        }
        let previous = self.nanos;
        // The cursor moves first so that cascading placement is computed
        // against the new time.
        self.nanos = now_nanos;

        for level in 0..LEVELS {
            let previous_ticks = previous >> SHIFT[level];
            let current_ticks = now_nanos >> SHIFT[level];
            if current_ticks <= previous_ticks {
                // This level's clock has not ticked; coarser levels cannot
                // have ticked either.
                break;
            }
            self.expire_level(
                level,
                previous_ticks,
                current_ticks - previous_ticks,
                &mut evict,
            );
        }
    }

    /// Sweeps the buckets of one level whose windows elapsed.
    fn expire_level<F>(&mut self, level: usize, previous_ticks: u64, delta: u64, evict: &mut F)
    where
        F: FnMut(&K, u64) -> bool,
    {
        let mask = (BUCKETS[level] - 1) as u64;
        // The bucket holding the previous tick is processed too (it may hold
        // deadlines from the partially-elapsed window); clamp to one full
        // revolution so no bucket is visited twice.
        let steps = delta.saturating_add(1).min(BUCKETS[level] as u64);
        let start = previous_ticks & mask;

        for i in 0..steps {
            let sentinel = sentinel_of(level, ((start + i) & mask) as usize);

            // Capture the chain and reset the bucket before visiting any
            // member, so a panicking predicate cannot leave the bucket
            // half-linked.
            let mut node = self.arena.head(sentinel);
            self.arena.reset_sentinel(sentinel);

            while node != sentinel {
                let next = self.arena.next_of(node);
                self.arena.clear_links(node);
                debug_assert_ne!(next, NIL);

                let expire = self.arena.expire_of(node);
                if expire > self.nanos {
                    // The coarse window elapsed before the deadline did:
                    // cascade into a finer bucket.
                    let bucket = self.find_bucket(expire);
                    self.arena.link_before(bucket, node);
                } else if self.offer(node, expire, evict) {
                    if let Some(key) = self.arena.free(node) {
                        self.index.remove(&key);
                    }
                } else {
                    // Refused: leave resident for its known deadline.
                    let bucket = self.find_bucket(expire);
                    self.arena.link_before(bucket, node);
                }
                node = next;
            }
        }
    }

    /// Delivers one due node to the predicate.
    #[inline]
    fn offer<F>(&self, node: usize, expire: u64, evict: &mut F) -> bool
    where
        F: FnMut(&K, u64) -> bool,
    {
        match self.arena.key_of(node) {
            Some(key) => evict(key, expire),
            // Sentinels never reach here; a keyless data node cannot exist.
            None => true,
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics (pure reads)
    // -----------------------------------------------------------------------

    /// Returns the number of keys currently scheduled (O(1)).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no keys are scheduled.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Nanoseconds until the earliest scheduled deadline, or `None` when the
    /// wheel is empty.  Already-due timers report a delay of 1.
    ///
    /// O(n) over resident timers; intended for maintenance pacing and
    /// debugging, not hot paths.
    pub fn next_expiration_delay(&self) -> Option<u64> {
        self.index
            .values()
            .map(|&idx| self.arena.expire_of(idx))
            .min()
            .map(|expire| expire.saturating_sub(self.nanos).max(1))
    }

    /// Snapshot of per-level, per-bucket occupancy.
    pub fn stats(&self) -> WheelStats {
        let levels = (0..LEVELS)
            .map(|level| LevelStats {
                span: SPANS[level],
                occupancy: (0..BUCKETS[level])
                    .map(|b| self.arena.iter_bucket(sentinel_of(level, b)).count())
                    .collect(),
            })
            .collect();
        WheelStats {
            nanos: self.nanos,
            scheduled: self.index.len(),
            levels,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics types
// ---------------------------------------------------------------------------

/// Point-in-time occupancy of a [`TimerWheel`].
#[derive(Debug, Clone)]
pub struct WheelStats {
    /// Cursor position at snapshot time, nanos since the wheel's epoch.
    pub nanos: u64,
    /// Number of scheduled keys.
    pub scheduled: usize,
    /// Per-level stats, finest first.
    pub levels: Vec<LevelStats>,
}

/// Occupancy of one wheel level.
#[derive(Debug, Clone)]
pub struct LevelStats {
    /// Span of each bucket in nanoseconds.
    pub span: u64,
    /// Resident node count per bucket.
    pub occupancy: Vec<usize>,
}

impl WheelStats {
    /// Total resident nodes in levels `0..level_bound`.
    pub fn resident_below(&self, level_bound: usize) -> usize {
        self.levels[..level_bound]
            .iter()
            .map(|l| l.occupancy.iter().sum::<usize>())
            .sum()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> fmt::Debug for TimerWheel<K> {
    /// Renders every non-empty bucket with its resident deadlines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "TimerWheel {{ nanos: {}, scheduled: {} }}",
            self.nanos,
            self.index.len()
        )?;
        for level in 0..LEVELS {
            for bucket in 0..BUCKETS[level] {
                let sentinel = sentinel_of(level, bucket);
                let mut members = self.arena.iter_bucket(sentinel).peekable();
                if members.peek().is_none() {
                    continue;
                }
                write!(f, "  wheel[{level}][{bucket}]:")?;
                for (key, expire) in members {
                    write!(f, " {key:?}@{expire}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
