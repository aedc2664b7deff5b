//! `enter_trace`/`exit_trace`/`emit_index`/`emit_detail`: the surface a hook
//! trampoline calls on every traced function entry and exit.
//!
//! Grounded directly on `spec.md` §4.6 (no single pack analogue; closest
//! corpus shape is `trace-ring`'s `Producer`, a thin wrapper dedicating one
//! `Ring` per caller). Destination selection is driven by a [`ModeFsm`]
//! cached per thread in [`ProducerTls`]; a reentrancy guard makes nested
//! hook invocations (a traced function called from inside the capture path
//! itself) a documented no-op rather than an infinite recursion.

use trace_registry::{ControlBlock, ThreadLaneSet};
use trace_ring::{DetailEvent, IndexEvent, Ring};

use crate::mode_fsm::{observe_healthy, Mode, ModeFsm};

/// Per-thread cached state: lane handles, reentrancy/call-depth counters,
/// and the thread's own `ModeFsm`. Grounded on `spec.md` §4.5's
/// `ProducerTLS` field list.
pub struct ProducerTls<'a> {
    lanes: &'a ThreadLaneSet,
    thread_id: u32,
    registered: bool,
    depth: u32,
    mode: ModeFsm,
}

impl<'a> ProducerTls<'a> {
    pub fn new(lanes: &'a ThreadLaneSet, thread_id: u32) -> Self {
        Self {
            lanes,
            thread_id,
            registered: true,
            depth: 0,
            mode: ModeFsm::new(),
        }
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn mode(&self) -> Mode {
        self.mode.mode()
    }

    /// Advances this thread's mode machine from the control block's current
    /// readiness/epoch/heartbeat fields.
    pub fn tick_mode(&mut self, control: &ControlBlock, now_ns: u64, timeout_ns: u64) -> Mode {
        let healthy = observe_healthy(control, now_ns, timeout_ns);
        let epoch = control.registry_epoch();
        self.mode.tick(healthy, epoch)
    }
}

/// Returned by [`CaptureApi::enter_trace`]; its depth determines whether the
/// matching `emit_*` calls are reentrant no-ops.
pub struct ReentrancyGuard(u32);

impl ReentrancyGuard {
    /// True when this guard was acquired while another guard on the same
    /// thread was already outstanding. Callers must drop the event instead
    /// of emitting it.
    pub fn is_reentrant(&self) -> bool {
        self.0 > 1
    }
}

/// Process-global capture surface: the global index/detail rings used in
/// `GLOBAL_ONLY`/`DUAL_WRITE`/fallback paths, plus the control block that
/// [`ProducerTls::tick_mode`] observes.
pub struct CaptureApi<'a> {
    global_index: &'a Ring<IndexEvent>,
    global_detail: &'a Ring<DetailEvent>,
    control: &'a ControlBlock,
}

impl<'a> CaptureApi<'a> {
    /// Constructing a `CaptureApi` is how the agent announces itself: it
    /// marks `hooks_ready` and both per-thread lane flags live, so the drain
    /// side and any newly-registered producer can tell a hook trampoline is
    /// actually wired up rather than waiting on a process that never attached.
    pub fn new(
        global_index: &'a Ring<IndexEvent>,
        global_detail: &'a Ring<DetailEvent>,
        control: &'a ControlBlock,
    ) -> Self {
        control.set_hooks_ready(true);
        control.set_index_lane_enabled(true);
        control.set_detail_lane_enabled(true);
        Self {
            global_index,
            global_detail,
            control,
        }
    }

    /// Increments the calling thread's reentrancy counter. A result with
    /// `is_reentrant() == true` means a traced call happened while the
    /// capture path itself was executing; the hook trampoline must drop the
    /// event rather than emit it.
    pub fn enter_trace(&self, tls: &mut ProducerTls) -> ReentrancyGuard {
        tls.depth += 1;
        ReentrancyGuard(tls.depth)
    }

    /// Decrements the calling thread's reentrancy counter.
    pub fn exit_trace(&self, tls: &mut ProducerTls, _guard: ReentrancyGuard) {
        tls.depth = tls.depth.saturating_sub(1);
    }

    pub fn emit_index(&self, tls: &ProducerTls, guard: &ReentrancyGuard, event: IndexEvent) {
        if guard.is_reentrant() {
            return;
        }
        match tls.mode() {
            Mode::GlobalOnly => {
                self.global_index.push(event);
            }
            Mode::DualWrite => {
                if !Self::write_per_thread(&tls.lanes.index, event) {
                    self.control.inc_fallback_events();
                }
                self.global_index.push(event);
            }
            Mode::PerThreadOnly => {
                if !Self::write_per_thread(&tls.lanes.index, event) {
                    self.control.inc_fallback_events();
                    self.global_index.push(event);
                }
            }
        }
    }

    pub fn emit_detail(&self, tls: &ProducerTls, guard: &ReentrancyGuard, event: DetailEvent) {
        if guard.is_reentrant() {
            return;
        }
        match tls.mode() {
            Mode::GlobalOnly => {
                self.global_detail.push(event);
            }
            Mode::DualWrite => {
                if !Self::write_per_thread(&tls.lanes.detail, event.clone()) {
                    self.control.inc_fallback_events();
                }
                self.global_detail.push(event);
            }
            Mode::PerThreadOnly => {
                if !Self::write_per_thread(&tls.lanes.detail, event.clone()) {
                    self.control.inc_fallback_events();
                    self.global_detail.push(event);
                }
            }
        }
    }

    /// Writes into the active ring of `lane`; on overflow, swaps in a fresh
    /// ring and retries once. Goes through `reserve` (not a pre-check of
    /// `is_full`) so a full active ring always counts against its own
    /// `overflow_count` even though the event still lands via the
    /// swapped-in ring. Returns false only when the pool itself is
    /// exhausted (`swap_active` finds no free ring).
    fn write_per_thread<T>(lane: &trace_ring::Lane<T>, event: T) -> bool {
        let active = lane.get_active_header();
        if let Some(mut reservation) = active.reserve(1) {
            reservation.as_mut_slice()[0] = std::mem::MaybeUninit::new(event);
            reservation.commit();
            return true;
        }
        match lane.swap_active() {
            Some(new_idx) => lane.ring(new_idx).push(event),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_ring::{EventKind, LaneConfig, RingConfig};

    fn lanes() -> ThreadLaneSet {
        let ring_cfg = RingConfig::new(2, 1, false);
        let lane_cfg = LaneConfig::new(ring_cfg, 2);
        ThreadLaneSet::new(lane_cfg, lane_cfg)
    }

    fn index_event() -> IndexEvent {
        IndexEvent::new(1, 7, 42, EventKind::Call, 0)
    }

    #[test]
    fn new_marks_hooks_and_lanes_ready() {
        let global_index = Ring::<IndexEvent>::new(RingConfig::new(4, 1, false));
        let global_detail = Ring::<DetailEvent>::new(RingConfig::new(4, 1, false));
        let control = ControlBlock::zeroed();
        assert!(!control.hooks_ready());

        let _api = CaptureApi::new(&global_index, &global_detail, &control);

        assert!(control.hooks_ready());
        assert!(control.index_lane_enabled());
        assert!(control.detail_lane_enabled());
    }

    #[test]
    fn global_only_writes_only_to_the_global_ring() {
        let lanes = lanes();
        let global_index = Ring::<IndexEvent>::new(RingConfig::new(4, 1, false));
        let global_detail = Ring::<DetailEvent>::new(RingConfig::new(4, 1, false));
        let control = ControlBlock::zeroed();
        let api = CaptureApi::new(&global_index, &global_detail, &control);
        let mut tls = ProducerTls::new(&lanes, 1);

        let guard = api.enter_trace(&mut tls);
        api.emit_index(&tls, &guard, index_event());
        api.exit_trace(&mut tls, guard);

        assert_eq!(global_index.len(), 1);
        assert_eq!(lanes.index.get_active_header().len(), 0);
    }

    #[test]
    fn per_thread_only_writes_only_to_the_lane() {
        let lanes = lanes();
        let global_index = Ring::<IndexEvent>::new(RingConfig::new(4, 1, false));
        let global_detail = Ring::<DetailEvent>::new(RingConfig::new(4, 1, false));
        let control = ControlBlock::zeroed();
        let api = CaptureApi::new(&global_index, &global_detail, &control);
        let mut tls = ProducerTls::new(&lanes, 1);
        tls.mode.tick(true, 1);
        tls.mode.tick(true, 1);
        assert_eq!(tls.mode(), Mode::PerThreadOnly);

        let guard = api.enter_trace(&mut tls);
        api.emit_index(&tls, &guard, index_event());
        api.exit_trace(&mut tls, guard);

        assert_eq!(global_index.len(), 0);
        assert_eq!(lanes.index.get_active_header().len(), 1);
    }

    #[test]
    fn reentrant_emit_is_a_no_op() {
        let lanes = lanes();
        let global_index = Ring::<IndexEvent>::new(RingConfig::new(4, 1, false));
        let global_detail = Ring::<DetailEvent>::new(RingConfig::new(4, 1, false));
        let control = ControlBlock::zeroed();
        let api = CaptureApi::new(&global_index, &global_detail, &control);
        let mut tls = ProducerTls::new(&lanes, 1);

        let outer = api.enter_trace(&mut tls);
        let inner = api.enter_trace(&mut tls);
        assert!(inner.is_reentrant());
        api.emit_index(&tls, &inner, index_event());
        api.exit_trace(&mut tls, inner);
        api.exit_trace(&mut tls, outer);

        assert_eq!(global_index.len(), 0);
    }

    #[test]
    fn per_thread_overflow_falls_back_to_global_and_counts_it() {
        let lanes = lanes();
        let global_index = Ring::<IndexEvent>::new(RingConfig::new(4, 1, false));
        let global_detail = Ring::<DetailEvent>::new(RingConfig::new(4, 1, false));
        let control = ControlBlock::zeroed();
        let api = CaptureApi::new(&global_index, &global_detail, &control);
        let mut tls = ProducerTls::new(&lanes, 1);
        tls.mode.tick(true, 1);
        tls.mode.tick(true, 1);

        // Pool has 2 rings; fill every ring in the pool (ring capacity 4
        // each from RingConfig::new(2, ..)) plus exhaust swap_active, then
        // one more emit must fall back to the global ring.
        let pool_size = lanes.index.pool_size();
        for _ in 0..pool_size {
            while !lanes.index.get_active_header().is_full() {
                let guard = api.enter_trace(&mut tls);
                api.emit_index(&tls, &guard, index_event());
                api.exit_trace(&mut tls, guard);
            }
            lanes.index.swap_active();
        }

        let before = control.fallback_events();
        let guard = api.enter_trace(&mut tls);
        api.emit_index(&tls, &guard, index_event());
        api.exit_trace(&mut tls, guard);

        assert_eq!(control.fallback_events(), before + 1);
        assert_eq!(global_index.len(), 1);
    }

    #[test]
    fn filling_the_active_ring_counts_its_overflow_before_swapping() {
        let lanes = lanes();
        let global_index = Ring::<IndexEvent>::new(RingConfig::new(4, 1, false));
        let global_detail = Ring::<DetailEvent>::new(RingConfig::new(4, 1, false));
        let control = ControlBlock::zeroed();
        let api = CaptureApi::new(&global_index, &global_detail, &control);
        let mut tls = ProducerTls::new(&lanes, 1);
        tls.mode.tick(true, 1);
        tls.mode.tick(true, 1);

        let active = lanes.index.get_active_header();
        while !active.is_full() {
            let guard = api.enter_trace(&mut tls);
            api.emit_index(&tls, &guard, index_event());
            api.exit_trace(&mut tls, guard);
        }
        assert_eq!(active.overflow_count(), 0);

        // Active ring is now full; this emit overflows it and triggers a swap.
        let guard = api.enter_trace(&mut tls);
        api.emit_index(&tls, &guard, index_event());
        api.exit_trace(&mut tls, guard);

        assert_eq!(active.overflow_count(), 1);
    }
}
