//! Per-thread pool of rings with lock-free active-ring handoff to a drainer.
//!
//! A `Lane<T>` owns a small fixed pool of `P` [`Ring<T>`] instances. Exactly
//! one is "active" (receiving writes from the owning thread) at any time; the
//! rest circulate between a free queue and a submitted queue. The free and
//! submitted queues are themselves [`Ring<u32>`] instances — the same SPSC
//! primitive used for event storage, just specialized to ring-slot indices,
//! rather than a second hand-rolled queue type.

use crate::invariants::debug_assert_index_queue_exclusive;
use crate::{LaneConfig, Ring, RingConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A small pool of `P` rings for one thread, with swap-on-exhaustion handoff
/// to a drain consumer.
pub struct Lane<T> {
    rings: Vec<Ring<T>>,
    /// Index (into `rings`) of the ring currently receiving writes.
    active: AtomicUsize,
    /// Indices not currently active, submitted, or held by the drainer.
    free: Ring<u32>,
    /// Indices handed off to the drainer but not yet taken.
    submitted: Ring<u32>,
    /// Per-ring "has at least one event matching the marking policy" flag.
    marked: Vec<AtomicBool>,
}

impl<T> Lane<T> {
    /// Builds a lane with `config.pool_size` rings. Ring 0 starts active; the
    /// rest start on the free queue.
    pub fn new(config: LaneConfig) -> Self {
        let pool_size = config.pool_size;
        let rings: Vec<Ring<T>> = (0..pool_size).map(|_| Ring::new(config.ring)).collect();
        rings[0].set_active(true);

        let queue_bits = (usize::BITS - pool_size.next_power_of_two().leading_zeros()).max(2) as u8;
        let queue_config = RingConfig::new(queue_bits, 1, false);
        let free = Ring::new(queue_config);
        let submitted = Ring::new(queue_config);
        for idx in 1..pool_size {
            free.push(idx as u32);
        }

        let marked = (0..pool_size).map(|_| AtomicBool::new(false)).collect();

        Self {
            rings,
            active: AtomicUsize::new(0),
            free,
            submitted,
            marked,
        }
    }

    /// Number of rings in the pool.
    pub fn pool_size(&self) -> usize {
        self.rings.len()
    }

    /// Returns the currently active ring.
    #[inline]
    pub fn get_active_header(&self) -> &Ring<T> {
        &self.rings[self.active.load(Ordering::Acquire)]
    }

    /// Returns the ring at a given pool index.
    pub fn ring(&self, idx: u32) -> &Ring<T> {
        &self.rings[idx as usize]
    }

    /// Atomically replaces the active ring with one taken from the free
    /// queue, and submits the old active ring's index for draining.
    ///
    /// Never blocks: if the free queue is empty the swap fails and returns
    /// `None`, leaving the active ring unchanged. The caller (`CaptureApi`)
    /// is responsible for handling exhaustion — typically by falling back to
    /// a global ring and counting `overflow_count`.
    pub fn swap_active(&self) -> Option<u32> {
        let Some(slice) = self.free.readable() else {
            return None;
        };
        if slice.is_empty() {
            return None;
        }
        let new_idx = slice[0];
        self.free.advance(1);

        let old_idx = self.active.load(Ordering::Acquire) as u32;
        self.rings[old_idx as usize].set_active(false);
        self.rings[new_idx as usize].set_active(true);
        self.active.store(new_idx as usize, Ordering::Release);

        self.submit_ring(old_idx);

        debug_assert_index_queue_exclusive!(old_idx, 1);
        Some(old_idx)
    }

    /// Hands a ring index to the drain consumer.
    pub fn submit_ring(&self, idx: u32) {
        self.submitted.push(idx);
    }

    /// Drain-side: takes the next submitted ring index, if any.
    pub fn take_ring(&self) -> Option<u32> {
        let slice = self.submitted.readable()?;
        if slice.is_empty() {
            return None;
        }
        let idx = slice[0];
        self.submitted.advance(1);
        Some(idx)
    }

    /// Drain-side: returns a fully-written ring index to the free queue.
    pub fn return_ring(&self, idx: u32) {
        self.clear_marked(idx);
        self.free.push(idx);
    }

    /// Marks a ring as containing at least one event that matched the
    /// marking policy (detail lanes only).
    pub fn mark_detail(&self, idx: u32) {
        self.marked[idx as usize].store(true, Ordering::Release);
    }

    /// Clears a ring's marked flag (called once it has been persisted or
    /// discarded).
    pub fn clear_marked(&self, idx: u32) {
        self.marked[idx as usize].store(false, Ordering::Release);
    }

    /// Returns whether a ring has been marked.
    pub fn has_marked(&self, idx: u32) -> bool {
        self.marked[idx as usize].load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RingConfig as RC;

    fn lane_config() -> LaneConfig {
        LaneConfig::new(RC::new(4, 1, false), 4)
    }

    #[test]
    fn starts_with_ring_zero_active_and_rest_free() {
        let lane = Lane::<u64>::new(lane_config());
        assert_eq!(lane.get_active_header() as *const _, lane.ring(0) as *const _);
    }

    #[test]
    fn swap_active_rotates_pool_and_submits_old_ring() {
        let lane = Lane::<u64>::new(lane_config());
        let old = lane.swap_active().expect("free queue has capacity");
        assert_eq!(old, 0);
        assert_ne!(
            lane.get_active_header() as *const _,
            lane.ring(0) as *const _
        );

        let submitted = lane.take_ring().expect("old ring was submitted");
        assert_eq!(submitted, 0);
        assert!(lane.take_ring().is_none());
    }

    #[test]
    fn swap_active_fails_when_free_queue_is_exhausted() {
        let lane = Lane::<u64>::new(LaneConfig::new(RC::new(4, 1, false), 2));
        // pool_size 2: ring 1 is free, ring 0 active.
        assert!(lane.swap_active().is_some());
        // Free queue now empty: next swap must fail without blocking.
        assert!(lane.swap_active().is_none());
    }

    #[test]
    fn return_ring_clears_marked_and_makes_ring_free_again() {
        let lane = Lane::<u64>::new(lane_config());
        lane.mark_detail(0);
        assert!(lane.has_marked(0));
        lane.return_ring(0);
        assert!(!lane.has_marked(0));
    }
}
