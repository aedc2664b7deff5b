//! Per-thread detail-lane persistence control: decides whether a full
//! detail ring gets written out or silently discarded.
//!
//! Grounded on
//! `original_source/include/tracer_backend/selective_persistence/detail_lane_control.h`'s
//! full operation list (`start_new_window`, `mark_event`, `should_dump`,
//! `close_window_for_dump`, `perform_selective_swap`,
//! `mark_dump_complete`), translated into one `SelectivePersistence`
//! instance per thread's detail lane, driven by the drain worker during its
//! own poll cycle (the only thread touching a given detail lane's metadata,
//! so no internal locking is needed).

use std::sync::Arc;

use trace_ring::{DetailEvent, Lane};

use crate::marking_policy::{MarkingPolicy, MarkingProbe};
use crate::persistence_window::SelectivePersistenceWindow;

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectivePersistenceMetrics {
    pub marked_events_detected: u64,
    pub selective_dumps_performed: u64,
    pub windows_discarded: u64,
}

/// Owns one thread's detail-lane window state. `policy` is shared (via
/// `Arc`) across every thread's control instance, so a `SelectivePersistence`
/// can be moved into the drain worker's dedicated thread; `window`/`metrics`
/// are per-thread.
pub struct SelectivePersistence {
    policy: Arc<MarkingPolicy>,
    window: SelectivePersistenceWindow,
    next_window_id: u64,
    metrics: SelectivePersistenceMetrics,
}

impl SelectivePersistence {
    pub fn new(policy: Arc<MarkingPolicy>) -> Self {
        Self {
            policy,
            window: SelectivePersistenceWindow::default(),
            next_window_id: 1,
            metrics: SelectivePersistenceMetrics::default(),
        }
    }

    pub fn metrics(&self) -> SelectivePersistenceMetrics {
        self.metrics
    }

    pub fn window(&self) -> &SelectivePersistenceWindow {
        &self.window
    }

    /// Starts a new capture window, discarding any prior one's state.
    pub fn start_new_window(&mut self, timestamp_ns: u64) {
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.window.reset(id, timestamp_ns);
    }

    /// Evaluates the marking policy against an observed event, updating the
    /// active window's mark state. Returns true if this event marked the
    /// window.
    pub fn mark_event(&mut self, probe: &MarkingProbe, timestamp_ns: u64) -> bool {
        self.window.record_event(timestamp_ns);
        if self.policy.matches(probe) {
            self.window.record_mark(timestamp_ns);
            self.metrics.marked_events_detected += 1;
            true
        } else {
            false
        }
    }

    /// Three-part predicate: the ring is truly full, the window has seen a
    /// mark, and the Lane's own `marked` flag is set for that ring index.
    pub fn should_dump(&self, ring_full: bool, lane_marked: bool) -> bool {
        ring_full && self.window.mark_seen && lane_marked
    }

    /// Closes the active window for persistence: `end_ns = max(now,
    /// last_event_ns)`. Returns a snapshot to hand to the Writer; does not
    /// itself start the next window (the caller does that after the swap
    /// succeeds, via `mark_dump_complete`).
    pub fn close_window_for_dump(&mut self, now_ns: u64) -> SelectivePersistenceWindow {
        self.window.end_ns = now_ns.max(self.window.last_event_ns);
        self.metrics.selective_dumps_performed += 1;
        self.window.clone()
    }

    /// Discards the active window without persisting it: clears the marked
    /// flag and zeroes mark-dependent counters, keeping the same window id
    /// (no data was ever written for it).
    pub fn discard_window(&mut self, detail_lane: &Lane<DetailEvent>, active_idx: u32) {
        detail_lane.clear_marked(active_idx);
        let id = self.window.window_id;
        let start = self.window.start_ns;
        self.window.reset(id, start);
        self.metrics.windows_discarded += 1;
    }

    /// Swaps in a fresh active ring for `detail_lane` and starts the next
    /// window at `next_window_start_ns`. Returns the submitted ring index
    /// on success, `None` if the pool is exhausted.
    pub fn perform_selective_swap(
        &mut self,
        detail_lane: &Lane<DetailEvent>,
        next_window_start_ns: u64,
    ) -> Option<u32> {
        let submitted = detail_lane.swap_active()?;
        self.start_new_window(next_window_start_ns);
        Some(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marking_policy::{MarkingMatch, MarkingTarget, PatternDesc};
    use trace_ring::LaneConfig;

    fn policy() -> Arc<MarkingPolicy> {
        Arc::new(MarkingPolicy::new(&[PatternDesc {
            target: MarkingTarget::Symbol,
            match_kind: MarkingMatch::Literal,
            case_sensitive: false,
            pattern: "panic".to_string(),
            module_name: None,
        }]))
    }

    #[test]
    fn should_dump_requires_all_three_conditions() {
        let policy = policy();
        let mut sp = SelectivePersistence::new(policy.clone());
        sp.start_new_window(0);

        assert!(!sp.should_dump(true, true));

        sp.mark_event(
            &MarkingProbe {
                symbol_name: Some("panic_handler"),
                module_name: None,
                message: None,
            },
            10,
        );
        assert!(sp.should_dump(true, true));
        assert!(!sp.should_dump(false, true));
        assert!(!sp.should_dump(true, false));
    }

    #[test]
    fn discard_window_resets_mark_state_but_keeps_window_id() {
        let policy = policy();
        let lane_cfg = LaneConfig::new(trace_ring::RingConfig::new(4, 1, false), 2);
        let lane = Lane::<DetailEvent>::new(lane_cfg);
        let mut sp = SelectivePersistence::new(policy.clone());
        sp.start_new_window(0);
        sp.mark_event(
            &MarkingProbe {
                symbol_name: Some("panic_handler"),
                module_name: None,
                message: None,
            },
            10,
        );
        let id_before = sp.window().window_id;

        sp.discard_window(&lane, 0);

        assert_eq!(sp.window().window_id, id_before);
        assert!(!sp.window().mark_seen);
        assert_eq!(sp.metrics().windows_discarded, 1);
    }

    #[test]
    fn perform_selective_swap_starts_a_fresh_window_on_success() {
        let policy = policy();
        let lane_cfg = LaneConfig::new(trace_ring::RingConfig::new(4, 1, false), 2);
        let lane = Lane::<DetailEvent>::new(lane_cfg);
        let mut sp = SelectivePersistence::new(policy.clone());
        sp.start_new_window(0);
        let first_id = sp.window().window_id;

        let submitted = sp.perform_selective_swap(&lane, 500);
        assert!(submitted.is_some());
        assert_ne!(sp.window().window_id, first_id);
        assert_eq!(sp.window().start_ns, 500);
    }
}
