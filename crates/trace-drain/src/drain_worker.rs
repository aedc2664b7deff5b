//! Background drain worker: the single dedicated thread that moves events
//! out of per-thread lanes and the global rings into the [`Writer`].
//!
//! Structurally grounded on `batch_processor.rs`'s should-flush/flush split
//! between pure decision logic and I/O, and on
//! `original_source/include/tracer_backend/drain_thread/drain_thread.h` for
//! the state machine, `DrainConfig`, and `DrainMetrics` fields, run on a
//! plain `std::thread::JoinHandle` rather than an async runtime task (the
//! DrainWorker is a single dedicated OS thread, not an async task).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use trace_registry::{ControlBlock, ThreadRegistry};
use trace_ring::{DetailEvent, IndexEvent, Ring};

use crate::config::DrainConfig;
use crate::marking_policy::{MarkingPolicy, MarkingProbe};
use crate::metrics::{jains_fairness_index, DrainMetrics, DrainMetricsSnapshot};
use crate::selective_persistence::SelectivePersistence;
use crate::writer::{Writer, WriterError};

/// Lifecycle states, carried over verbatim from `DrainState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DrainState {
    Uninitialized = 0,
    Initialized = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl DrainState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => DrainState::Initialized,
            2 => DrainState::Running,
            3 => DrainState::Stopping,
            4 => DrainState::Stopped,
            _ => DrainState::Uninitialized,
        }
    }
}

fn now_ns() -> u64 {
    // A monotonic clock substitute: wall-clock nanoseconds since process
    // start would require a fixed epoch unavailable without a timer
    // dependency already in the stack; callers only ever compare
    // differences within one process lifetime.
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

struct SharedState {
    state: AtomicU8,
    stop_requested: AtomicBool,
    metrics: DrainMetrics,
}

/// Everything the drain thread's closure needs, owned by that thread alone.
struct WorkerCtx {
    registry: Arc<ThreadRegistry>,
    control: Arc<ControlBlock>,
    global_index: Arc<Ring<IndexEvent>>,
    global_detail: Arc<Ring<DetailEvent>>,
    policy: Arc<MarkingPolicy>,
    config: DrainConfig,
    shared: Arc<SharedState>,
    writer: Writer,
}

/// Background drain worker. Owns no lanes directly — it reads them through
/// the shared [`ThreadRegistry`] — and writes out through its private
/// [`Writer`].
pub struct DrainWorker {
    shared: Arc<SharedState>,
    handle: Option<JoinHandle<Writer>>,
}

impl DrainWorker {
    pub fn new(
        registry: Arc<ThreadRegistry>,
        control: Arc<ControlBlock>,
        global_index: Arc<Ring<IndexEvent>>,
        global_detail: Arc<Ring<DetailEvent>>,
        policy: Arc<MarkingPolicy>,
        config: DrainConfig,
        writer: Writer,
    ) -> Self {
        let shared = Arc::new(SharedState {
            state: AtomicU8::new(DrainState::Initialized as u8),
            stop_requested: AtomicBool::new(false),
            metrics: DrainMetrics::default(),
        });
        let ctx = WorkerCtx {
            registry,
            control,
            global_index,
            global_detail,
            policy,
            config,
            shared: Arc::clone(&shared),
            writer,
        };
        Self {
            shared,
            handle: Some(spawn_worker(ctx)),
        }
    }

    pub fn state(&self) -> DrainState {
        DrainState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> DrainMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Requests a final drain pass and stop, then joins the worker thread.
    /// Returns the Writer so the caller (ShutdownManager) can fsync it
    /// again as part of its own shutdown summary. Panics if called more
    /// than once.
    pub fn stop(&mut self) -> Writer {
        self.shared.state.store(DrainState::Stopping as u8, Ordering::Release);
        self.shared.stop_requested.store(true, Ordering::Release);
        let handle = self.handle.take().expect("DrainWorker::stop called more than once");
        handle.join().expect("drain worker thread panicked")
    }
}

fn spawn_worker(mut ctx: WorkerCtx) -> JoinHandle<Writer> {
    std::thread::Builder::new()
        .name("trace-drain".to_string())
        .spawn(move || {
            ctx.shared.state.store(DrainState::Running as u8, Ordering::Release);
            run_loop(&mut ctx);
            ctx.shared.state.store(DrainState::Stopped as u8, Ordering::Release);
            ctx.writer
        })
        .expect("failed to spawn drain thread")
}

fn run_loop(ctx: &mut WorkerCtx) {
    let capacity = ctx.registry.capacity();
    let mut credits = vec![0i64; capacity];
    let mut persistence: Vec<Option<SelectivePersistence>> = (0..capacity).map(|_| None).collect();
    let mut cycles = 0u64;

    loop {
        let stopping = ctx.shared.stop_requested.load(Ordering::Acquire);
        let did_work = drain_cycle(ctx, &mut credits, &mut persistence, stopping);
        ctx.shared.metrics.add_cycle(!did_work);
        cycles += 1;

        ctx.control.set_heartbeat_ns(now_ns());
        if cycles <= 5 && ctx.control.registry_mode() < 2 {
            ctx.control
                .set_registry_mode(ctx.control.registry_mode() + 1);
        }

        if stopping {
            if all_drained(ctx) {
                ctx.shared.metrics.add_final_drain();
                break;
            }
            continue;
        }

        if !did_work {
            if ctx.config.yield_on_idle {
                std::thread::yield_now();
                ctx.shared.metrics.add_yield();
            } else {
                std::thread::sleep(ctx.config.poll_interval());
                ctx.shared.metrics.add_sleep(ctx.config.poll_interval_us as u64);
            }
        }
    }

    let _ = ctx.writer.finalize(now_ns());
    let fairness = jains_fairness_index(&credits.iter().map(|&c| c.max(0) as u64).collect::<Vec<_>>());
    tracing::debug!(fairness, "drain worker final fairness index");
}

fn all_drained(ctx: &WorkerCtx) -> bool {
    for i in 0..ctx.registry.capacity() {
        if !ctx.registry.is_active(i) {
            continue;
        }
        let Some(lanes) = ctx.registry.get_at(i) else {
            continue;
        };
        if lanes.index.take_ring().is_some() || lanes.detail.take_ring().is_some() {
            return false;
        }
        if lanes.index.get_active_header().len() > 0 || lanes.detail.get_active_header().len() > 0 {
            return false;
        }
    }
    true
}

/// Runs one pass over every active thread slot. Returns true if any work
/// was done (a ring was drained from a lane or the global rings).
fn drain_cycle(
    ctx: &mut WorkerCtx,
    credits: &mut [i64],
    persistence: &mut [Option<SelectivePersistence>],
    final_pass: bool,
) -> bool {
    let mut did_work = false;
    let capacity = ctx.registry.capacity();
    let threads_this_cycle = if ctx.config.max_threads_per_cycle == 0 {
        capacity
    } else {
        (ctx.config.max_threads_per_cycle as usize).min(capacity)
    };

    let order = select_slots(ctx, credits, threads_this_cycle);
    for slot in order {
        if persistence[slot].is_none() {
            persistence[slot] = Some(SelectivePersistence::new(Arc::clone(&ctx.policy)));
            persistence[slot].as_mut().unwrap().start_new_window(now_ns());
        }

        let Some(lanes) = ctx.registry.get_at(slot) else {
            continue;
        };

        let max_batch_size = ctx.config.max_batch_size;
        let fairness_quantum = ctx.config.fairness_quantum;

        let mut consumed_here = 0u32;
        while max_batch_size == 0 || consumed_here < max_batch_size {
            let Some(idx) = lanes.index.take_ring() else {
                break;
            };
            drain_index_ring(&mut ctx.writer, &lanes.index, idx);
            ctx.shared.metrics.add_ring(false);
            did_work = true;
            consumed_here += 1;
            credits[slot] += 1;
            if fairness_quantum != 0 && consumed_here >= fairness_quantum {
                ctx.shared.metrics.add_fairness_switch();
                break;
            }
        }

        let sp = persistence[slot].as_mut().unwrap();
        let mut consumed_here = 0u32;
        while max_batch_size == 0 || consumed_here < max_batch_size {
            let Some(idx) = lanes.detail.take_ring() else {
                break;
            };
            let pending = drain_detail_ring(&lanes.detail, idx, sp);
            let lane_marked = lanes.detail.has_marked(idx);
            if sp.should_dump(true, lane_marked) {
                for event in pending {
                    let payload = event.stack_snapshot.clone();
                    let _ = ctx.writer.write_event(event.header.kind, event.header, &payload);
                }
                let window = sp.close_window_for_dump(now_ns());
                let _ = ctx.writer.write_window_metadata(&window);
                sp.perform_selective_swap(&lanes.detail, now_ns());
            } else {
                sp.discard_window(&lanes.detail, idx);
            }
            lanes.detail.return_ring(idx);
            ctx.shared.metrics.add_ring(true);
            did_work = true;
            consumed_here += 1;
            credits[slot] += 1;
            if fairness_quantum != 0 && consumed_here >= fairness_quantum {
                ctx.shared.metrics.add_fairness_switch();
                break;
            }
        }

        if final_pass {
            force_swap_if_readable(&lanes.index);
            force_swap_if_readable(&lanes.detail);
        }
    }

    did_work |= drain_global(ctx);
    did_work
}

fn select_slots(ctx: &WorkerCtx, credits: &mut [i64], limit: usize) -> Vec<usize> {
    let active: Vec<usize> = (0..ctx.registry.capacity())
        .filter(|&i| ctx.registry.is_active(i))
        .collect();
    if !ctx.config.enable_fair_scheduling {
        return active.into_iter().take(limit).collect();
    }
    let mut ranked = active;
    ranked.sort_by_key(|&i| std::cmp::Reverse(credits[i]));
    ranked.into_iter().take(limit).collect()
}

fn drain_index_ring(writer: &mut Writer, lane: &trace_ring::Lane<IndexEvent>, idx: u32) {
    let ring = lane.ring(idx);
    let mut pending = Vec::new();
    ring.consume_batch_owned(|event| pending.push(event));
    for event in pending {
        let _ = writer.write_event(event.kind, event, &[]);
    }
    lane.return_ring(idx);
}

/// Reads one detail ring's events into the marking policy, setting the
/// Lane's `marked` flag for this index if any event matched, and returns
/// the events for the caller to persist or discard based on
/// `SelectivePersistence::should_dump`.
fn drain_detail_ring(
    lane: &trace_ring::Lane<DetailEvent>,
    idx: u32,
    sp: &mut SelectivePersistence,
) -> Vec<DetailEvent> {
    let ring = lane.ring(idx);
    let mut pending = Vec::new();
    ring.consume_batch_owned(|event| pending.push(event));

    let mut marked_any = false;
    for event in &pending {
        let symbol = format!("fn_{}", event.header.function_id);
        let message = event.signal.as_ref().map(|s| s.signal_name.as_str());
        let probe = MarkingProbe {
            symbol_name: Some(&symbol),
            module_name: None,
            message,
        };
        if sp.mark_event(&probe, event.header.timestamp) {
            marked_any = true;
        }
    }
    if marked_any {
        lane.mark_detail(idx);
    }

    pending
}

fn force_swap_if_readable<T>(lane: &trace_ring::Lane<T>) {
    if lane.get_active_header().len() > 0 {
        lane.swap_active();
    }
}

fn drain_global(ctx: &mut WorkerCtx) -> bool {
    let mut did_work = false;
    let global_index = Arc::clone(&ctx.global_index);
    let n = global_index.consume_batch_owned(|event: IndexEvent| {
        let _ = ctx.writer.write_event(event.kind, event, &[]);
    });
    did_work |= n > 0;

    let global_detail = Arc::clone(&ctx.global_detail);
    let n = global_detail.consume_batch_owned(|event: DetailEvent| {
        let payload = event.stack_snapshot.clone();
        let _ = ctx.writer.write_event(event.header.kind, event.header, &payload);
    });
    did_work |= n > 0;

    did_work
}

/// Errors surfaced by drain-thread control operations. Most drain-loop
/// errors never reach here: they are counted and the worker proceeds, per
/// `spec.md` §5's propagation policy.
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("writer error: {0}")]
    Writer(#[from] WriterError),
}
