//! A single detail-lane capture window's bookkeeping, persisted as one JSON
//! line per window in `window_metadata.jsonl`.
//!
//! Grounded on
//! `original_source/include/tracer_backend/selective_persistence/persistence_window.h`'s
//! `SelectivePersistenceWindow`; field names shortened to match `spec.md`
//! §6's `window_metadata.jsonl` key list directly rather than carrying the
//! header's longer C names.

use serde::Serialize;

/// One capture window's lifecycle counters, serialized verbatim as a
/// `window_metadata.jsonl` line.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectivePersistenceWindow {
    pub window_id: u64,
    pub start_ns: u64,
    pub end_ns: u64,
    pub first_mark_ns: u64,
    pub last_event_ns: u64,
    pub total_events: u64,
    pub marked_events: u64,
    pub mark_seen: bool,
}

impl SelectivePersistenceWindow {
    /// Resets every field but `window_id`, which the caller bumps
    /// explicitly when starting a genuinely new window.
    pub fn reset(&mut self, window_id: u64, start_ns: u64) {
        *self = Self {
            window_id,
            start_ns,
            ..Default::default()
        };
    }

    /// Records that an event has been observed in this window.
    pub fn record_event(&mut self, now_ns: u64) {
        self.total_events += 1;
        self.last_event_ns = now_ns;
    }

    /// Records that a marking-policy match fired for this window.
    pub fn record_mark(&mut self, now_ns: u64) {
        if !self.mark_seen {
            self.first_mark_ns = now_ns;
        }
        self.mark_seen = true;
        self.marked_events += 1;
    }
}
