//! Bounded MPSC write buffer backed by a lock-free `ArrayQueue`.
//!
//! Timer-wheel mutations are enqueued here so the hot read/write paths never
//! block on the wheel mutex.  A maintenance pass drains the queue and applies
//! all pending operations under a single lock acquisition, before advancing
//! the wheel.
//!
//! If the queue is full when a push is attempted, the operation is returned
//! to the caller as `Err(op)` so it can be applied synchronously — scheduling
//! operations must never be lost because they keep the wheel consistent with
//! the store.

use crossbeam_queue::ArrayQueue;

/// Bounded capacity of the write queue.
const WRITE_BUFFER_CAPACITY: usize = 128;

/// Operations deferred for wheel maintenance.
pub enum WriteOp<K> {
    /// Schedule (or move) the key's timer to a new absolute deadline.
    ///
    /// Covers entry creation, value replacement, and read-triggered
    /// extensions alike: the wheel keeps at most one node per key, so the
    /// operation is idempotent and order-insensitive.
    Schedule {
        key: K,
        /// Absolute expiry time in nanos since epoch.
        expires_at: u64,
    },
    /// Drop the key's timer after the entry left the store.
    Remove {
        key: K,
    },
}

/// Bounded MPSC write buffer.
///
/// Multiple producer threads may call [`push`] concurrently.  A single
/// consumer (the maintenance thread) drains the queue via [`drain`].
///
/// [`push`]: WriteBuffer::push
/// [`drain`]: WriteBuffer::drain
pub struct WriteBuffer<K> {
    queue: ArrayQueue<WriteOp<K>>,
}

impl<K: Send> WriteBuffer<K> {
    /// Creates a new write buffer with the default capacity.
    pub fn new() -> Self {
        WriteBuffer {
            queue: ArrayQueue::new(WRITE_BUFFER_CAPACITY),
        }
    }

    /// Enqueues `op`.
    ///
    /// Returns `Ok(())` if the operation was accepted, or `Err(op)` if the
    /// queue is full.  The caller **must not drop** a returned `Err`.
    #[inline]
    pub fn push(&self, op: WriteOp<K>) -> Result<(), WriteOp<K>> {
        self.queue.push(op)
    }

    /// Returns `true` when the queue has reached its capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Drains all pending operations into `out`.
    ///
    /// Called exclusively from the maintenance thread.
    pub fn drain(&self, out: &mut Vec<WriteOp<K>>) {
        while let Some(op) = self.queue.pop() {
            out.push(op);
        }
    }
}

impl<K: Send> Default for WriteBuffer<K> {
    fn default() -> Self {
        Self::new()
    }
}
