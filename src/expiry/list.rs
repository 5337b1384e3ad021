//! Arena-backed circular doubly-linked lists for the timer wheel.
//!
//! Every wheel bucket is a **sentinel** slot whose `prev`/`next` point at the
//! first and last member of its list; an empty bucket's sentinel points at
//! itself.  Data nodes live in the same arena and are addressed by stable
//! index, so membership changes are pure index surgery: `link_before` appends
//! in O(1), `unlink` removes a node through its own links in O(1), and a
//! traversal terminates when it revisits the sentinel it started from.
//!
//! Sentinels occupy the first `sentinel_count` slots and are allocated once;
//! data slots are recycled through a free list.

/// Marks an absent link.  A data node holds `NIL` links exactly while it is
/// detached (between removal and re-insertion).
pub(crate) const NIL: usize = usize::MAX;

/// A single arena slot: sentinel, live timer, or free.
struct TimerNode<K> {
    /// `None` only for sentinel and free slots.
    key: Option<K>,
    /// Absolute expiration time in nanoseconds.
    expire: u64,
    prev: usize,
    next: usize,
}

/// Arena of timer nodes with embedded circular lists.
pub(crate) struct NodeArena<K> {
    nodes: Vec<TimerNode<K>>,
    /// Recycled data-slot indices.
    free_list: Vec<usize>,
    /// Number of leading sentinel slots.
    sentinel_count: usize,
}

impl<K> NodeArena<K> {
    /// Creates an arena with `sentinel_count` self-linked sentinels.
    pub(crate) fn new(sentinel_count: usize) -> Self {
        let mut nodes = Vec::with_capacity(sentinel_count);
        for idx in 0..sentinel_count {
            nodes.push(TimerNode {
                key: None,
                expire: 0,
                prev: idx,
                next: idx,
            });
        }
        NodeArena {
            nodes,
            free_list: Vec::new(),
            sentinel_count,
        }
    }

    // -----------------------------------------------------------------------
    // Slot lifecycle
    // -----------------------------------------------------------------------

    /// Allocates a detached data slot for `key`, recycling a freed slot when
    /// one is available.
    pub(crate) fn alloc(&mut self, key: K, expire: u64) -> usize {
        if let Some(idx) = self.free_list.pop() {
            let n = &mut self.nodes[idx];
            n.key = Some(key);
            n.expire = expire;
            n.prev = NIL;
            n.next = NIL;
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(TimerNode {
                key: Some(key),
                expire,
                prev: NIL,
                next: NIL,
            });
            idx
        }
    }

    /// Releases a **detached** data slot and returns its key.
    pub(crate) fn free(&mut self, idx: usize) -> Option<K> {
        debug_assert!(idx >= self.sentinel_count, "freeing a sentinel");
        debug_assert_eq!(self.nodes[idx].prev, NIL, "freeing a linked node");
        let key = self.nodes[idx].key.take()?;
        self.free_list.push(idx);
        Some(key)
    }

    // -----------------------------------------------------------------------
    // List surgery
    // -----------------------------------------------------------------------

    /// Appends detached node `idx` just before `sentinel` (tail insert).
    pub(crate) fn link_before(&mut self, sentinel: usize, idx: usize) {
        debug_assert!(sentinel < self.sentinel_count);
        debug_assert_eq!(self.nodes[idx].prev, NIL, "linking an already-linked node");
        let tail = self.nodes[sentinel].prev;
        self.nodes[idx].prev = tail;
        self.nodes[idx].next = sentinel;
        self.nodes[tail].next = idx;
        self.nodes[sentinel].prev = idx;
    }

    /// Removes node `idx` from whatever list it is in, using only its own
    /// links.  After this call `nodes[idx].{prev, next} == NIL`.
    pub(crate) fn unlink(&mut self, idx: usize) {
        debug_assert!(idx >= self.sentinel_count, "unlinking a sentinel");
        debug_assert_ne!(self.nodes[idx].prev, NIL, "unlinking a detached node");
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    /// Clears a node's links without touching its neighbours.  Used while
    /// consuming a chain whose sentinel has already been reset.
    pub(crate) fn clear_links(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    /// Points `sentinel` back at itself, leaving its former members as a
    /// detached chain reachable from the previously-captured head.
    pub(crate) fn reset_sentinel(&mut self, sentinel: usize) {
        debug_assert!(sentinel < self.sentinel_count);
        self.nodes[sentinel].prev = sentinel;
        self.nodes[sentinel].next = sentinel;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// First member of `sentinel`'s list, or `sentinel` itself when empty.
    #[inline]
    pub(crate) fn head(&self, sentinel: usize) -> usize {
        self.nodes[sentinel].next
    }

    #[inline]
    pub(crate) fn next_of(&self, idx: usize) -> usize {
        self.nodes[idx].next
    }

    #[inline]
    pub(crate) fn expire_of(&self, idx: usize) -> u64 {
        self.nodes[idx].expire
    }

    #[inline]
    pub(crate) fn key_of(&self, idx: usize) -> Option<&K> {
        self.nodes[idx].key.as_ref()
    }

    /// Iterates `(key, expire)` over a bucket without mutating it.
    pub(crate) fn iter_bucket(&self, sentinel: usize) -> BucketIter<'_, K> {
        BucketIter {
            arena: self,
            sentinel,
            cursor: self.nodes[sentinel].next,
        }
    }
}

/// Read-only traversal of one bucket, ending when the sentinel is revisited.
pub(crate) struct BucketIter<'a, K> {
    arena: &'a NodeArena<K>,
    sentinel: usize,
    cursor: usize,
}

impl<'a, K> Iterator for BucketIter<'a, K> {
    type Item = (&'a K, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.sentinel {
            return None;
        }
        let node = &self.arena.nodes[self.cursor];
        self.cursor = node.next;
        node.key.as_ref().map(|k| (k, node.expire))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> NodeArena<u32> {
        NodeArena::new(2)
    }

    fn members(a: &NodeArena<u32>, sentinel: usize) -> Vec<u32> {
        a.iter_bucket(sentinel).map(|(k, _)| *k).collect()
    }

    #[test]
    fn new_sentinels_are_self_linked() {
        let a = arena();
        assert_eq!(a.head(0), 0);
        assert_eq!(a.head(1), 1);
        assert!(members(&a, 0).is_empty());
    }

    #[test]
    fn link_before_appends_in_fifo_order() {
        let mut a = arena();
        for k in [10, 20, 30] {
            let idx = a.alloc(k, u64::from(k));
            a.link_before(0, idx);
        }
        assert_eq!(members(&a, 0), vec![10, 20, 30]);
        assert!(members(&a, 1).is_empty(), "other bucket must stay empty");
    }

    #[test]
    fn unlink_middle_preserves_order() {
        let mut a = arena();
        let idx: Vec<usize> = [1u32, 2, 3].iter().map(|&k| {
            let i = a.alloc(k, 0);
            a.link_before(0, i);
            i
        }).collect();

        a.unlink(idx[1]);
        assert_eq!(members(&a, 0), vec![1, 3]);
        assert_eq!(a.next_of(idx[1]), NIL, "unlinked node must be detached");

        a.unlink(idx[0]);
        a.unlink(idx[2]);
        assert!(members(&a, 0).is_empty());
        assert_eq!(a.head(0), 0, "empty bucket points back at its sentinel");
    }

    #[test]
    fn freed_slots_are_recycled() {
        let mut a = arena();
        let first = a.alloc(7, 0);
        a.link_before(0, first);
        a.unlink(first);
        assert_eq!(a.free(first), Some(7));

        let second = a.alloc(8, 0);
        assert_eq!(second, first, "free list should hand back the slot");
        assert_eq!(a.key_of(second), Some(&8));
    }

    #[test]
    fn reset_sentinel_detaches_chain() {
        let mut a = arena();
        let i1 = a.alloc(1, 0);
        let i2 = a.alloc(2, 0);
        a.link_before(0, i1);
        a.link_before(0, i2);

        let head = a.head(0);
        a.reset_sentinel(0);
        assert!(members(&a, 0).is_empty());

        // The detached chain is still walkable up to the sentinel.
        assert_eq!(head, i1);
        assert_eq!(a.next_of(i1), i2);
        assert_eq!(a.next_of(i2), 0);
    }
}
