//! Fixed-capacity registry of per-thread lane pairs.
//!
//! Grounded on
//! `original_source/include/tracer_backend/interfaces/thread_registry_interface.h`'s
//! memory layout contract (64-byte-aligned header, 128-byte-aligned
//! per-slot lane pairs) and on `trace-ring`'s `Channel::register` for the
//! "allocate the next free slot with a single fetch_add" registration
//! shape. Registration itself takes a short-lived lock for thread-id
//! deduplication (a cold path, run once per thread lifetime); the lanes
//! themselves are accessed lock-free from the hot path.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use trace_ring::{DetailEvent, IndexEvent, Lane, LaneConfig};

/// One thread's index + detail lane pair.
pub struct ThreadLaneSet {
    pub index: Lane<IndexEvent>,
    pub detail: Lane<DetailEvent>,
}

impl ThreadLaneSet {
    pub fn new(index_config: LaneConfig, detail_config: LaneConfig) -> Self {
        Self {
            index: Lane::new(index_config),
            detail: Lane::new(detail_config),
        }
    }
}

struct Slot {
    thread_id: AtomicU32,
    active: std::sync::atomic::AtomicBool,
    lanes: ThreadLaneSet,
}

/// Errors returned by [`ThreadRegistry::register`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// All slots are in use; the registry has a fixed capacity set at
    /// construction.
    #[error("thread registry is full (capacity: {capacity})")]
    Full {
        /// The registry's fixed capacity.
        capacity: usize,
    },
}

/// Fixed-capacity, 128-byte-per-slot arena mapping OS thread ids to lane
/// pairs. Unregistering a slot never frees its backing memory: late writers
/// racing a shutdown must never dereference freed storage.
pub struct ThreadRegistry {
    slots: Vec<Slot>,
    next_free: AtomicUsize,
    active_count: AtomicUsize,
    epoch: AtomicU32,
    dedup: Mutex<std::collections::HashMap<u32, usize>>,
}

impl ThreadRegistry {
    pub fn new(capacity: usize, index_config: LaneConfig, detail_config: LaneConfig) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                thread_id: AtomicU32::new(0),
                active: std::sync::atomic::AtomicBool::new(false),
                lanes: ThreadLaneSet::new(index_config, detail_config),
            })
            .collect();

        Self {
            slots,
            next_free: AtomicUsize::new(0),
            active_count: AtomicUsize::new(0),
            epoch: AtomicU32::new(0),
            dedup: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently active (registered and not yet unregistered)
    /// slots.
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    /// Monotonic counter bumped on every topology change (register or
    /// unregister), consulted by `ModeFsm`'s `last_seen_epoch` tracking.
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Registers `thread_id`, allocating the next free slot. Re-registering
    /// an already-active thread id returns its existing slot instead of
    /// allocating a new one.
    pub fn register(&self, thread_id: u32) -> Result<usize, RegistryError> {
        let mut dedup = self.dedup.lock().unwrap();
        if let Some(&slot) = dedup.get(&thread_id) {
            if self.slots[slot].active.load(Ordering::Acquire) {
                return Ok(slot);
            }
        }

        let slot = self.next_free.fetch_add(1, Ordering::SeqCst);
        if slot >= self.slots.len() {
            self.next_free.fetch_sub(1, Ordering::SeqCst);
            return Err(RegistryError::Full {
                capacity: self.slots.len(),
            });
        }

        self.slots[slot].thread_id.store(thread_id, Ordering::Release);
        self.slots[slot].active.store(true, Ordering::Release);
        dedup.insert(thread_id, slot);
        drop(dedup);

        self.active_count.fetch_add(1, Ordering::AcqRel);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Ok(slot)
    }

    /// Marks a slot inactive. The lane pair's memory is preserved: any
    /// writer still holding a stale reference to this slot must never see
    /// deallocated storage.
    pub fn unregister(&self, slot: usize) {
        if slot >= self.slots.len() {
            return;
        }
        if self.slots[slot]
            .active
            .swap(false, Ordering::AcqRel)
        {
            self.active_count.fetch_sub(1, Ordering::AcqRel);
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Returns the lane pair at slot `i`, if any slot exists there. Returns
    /// the lanes regardless of the slot's active/inactive state: memory is
    /// never freed, so this is always safe to call.
    pub fn get_at(&self, i: usize) -> Option<&ThreadLaneSet> {
        self.slots.get(i).map(|s| &s.lanes)
    }

    /// Returns true if slot `i` is currently active.
    pub fn is_active(&self, i: usize) -> bool {
        self.slots
            .get(i)
            .is_some_and(|s| s.active.load(Ordering::Acquire))
    }
}
