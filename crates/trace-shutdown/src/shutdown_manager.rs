//! Phase-based shutdown sequence: signal/timer/manual triggers converge on
//! one idempotent `request_shutdown`, and `execute` stops threads, cancels
//! any pending timer, drives the drain worker to a final flush, and fsyncs
//! the output files.
//!
//! Grounded on
//! `original_source/include/tracer_backend/controller/shutdown.h`'s
//! `ShutdownPhase`/`ShutdownReason`/`ShutdownThreadState`/`ShutdownState`/
//! `ShutdownManager`/`SignalHandler` structs and function list, with the
//! `ShutdownOps` C function-pointer table replaced by a boxed closure (the
//! Rust idiom for "inject one callback" where C injects a vtable) and the
//! raw `wake_read_fd`/`wake_write_fd` self-pipe replaced by a
//! `std::sync::mpsc` channel: the caller builds the channel and hands the
//! sending half to [`ShutdownManager::set_wakeup_channel`], keeping the
//! receiving half to park a main loop on, the same role the original's
//! `wake_read_fd` played.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use trace_drain::DrainWorker;
use trace_registry::ThreadRegistry;

use crate::error::ShutdownError;
#[cfg(debug_assertions)]
use crate::invariants::{
    debug_assert_completion_drained, debug_assert_idempotent_request, debug_assert_phase_monotonic,
};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    Idle = 0,
    SignalReceived = 1,
    StoppingThreads = 2,
    Draining = 3,
    Completed = 4,
}

impl ShutdownPhase {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => ShutdownPhase::Idle,
            1 => ShutdownPhase::SignalReceived,
            2 => ShutdownPhase::StoppingThreads,
            3 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Completed,
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    None = 0,
    Signal = 1,
    Timer = 2,
    Manual = 3,
}

impl ShutdownReason {
    fn from_i32(v: i32) -> Self {
        match v {
            1 => ShutdownReason::Signal,
            2 => ShutdownReason::Timer,
            3 => ShutdownReason::Manual,
            _ => ShutdownReason::None,
        }
    }
}

/// Per-slot bookkeeping for the drain handshake.
pub struct ShutdownThreadState {
    accepting_events: AtomicBool,
    flush_requested: AtomicBool,
    flush_complete: AtomicBool,
    pending_events: AtomicU64,
}

impl ShutdownThreadState {
    fn new() -> Self {
        Self {
            accepting_events: AtomicBool::new(true),
            flush_requested: AtomicBool::new(false),
            flush_complete: AtomicBool::new(false),
            pending_events: AtomicU64::new(0),
        }
    }

    pub fn is_accepting_events(&self) -> bool {
        self.accepting_events.load(Ordering::Acquire)
    }

    pub fn flush_requested(&self) -> bool {
        self.flush_requested.load(Ordering::Acquire)
    }

    pub fn flush_complete(&self) -> bool {
        self.flush_complete.load(Ordering::Acquire)
    }

    pub fn pending_events(&self) -> u64 {
        self.pending_events.load(Ordering::Acquire)
    }
}

/// Per-process bookkeeping spanning every registered thread slot.
pub struct ShutdownState {
    threads: Vec<ShutdownThreadState>,
    active_threads: AtomicU32,
    threads_stopped: AtomicU32,
    threads_flushed: AtomicU32,
}

impl ShutdownState {
    pub fn new(capacity: usize) -> Self {
        Self {
            threads: (0..capacity).map(|_| ShutdownThreadState::new()).collect(),
            active_threads: AtomicU32::new(0),
            threads_stopped: AtomicU32::new(0),
            threads_flushed: AtomicU32::new(0),
        }
    }

    pub fn mark_active(&self, slot: usize) {
        self.threads[slot].accepting_events.store(true, Ordering::Release);
        self.active_threads.fetch_add(1, Ordering::AcqRel);
    }

    pub fn mark_inactive(&self, slot: usize) {
        self.threads[slot].accepting_events.store(false, Ordering::Release);
        self.threads_stopped.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_pending(&self, slot: usize, pending_events: u64) {
        self.threads[slot].pending_events.store(pending_events, Ordering::Release);
    }

    pub fn request_flush(&self, slot: usize) {
        self.threads[slot].flush_requested.store(true, Ordering::Release);
    }

    pub fn mark_flushed(&self, slot: usize) {
        self.threads[slot].flush_complete.store(true, Ordering::Release);
        self.threads_flushed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn thread(&self, slot: usize) -> &ShutdownThreadState {
        &self.threads[slot]
    }

    pub fn active_threads(&self) -> u32 {
        self.active_threads.load(Ordering::Acquire)
    }

    pub fn threads_stopped(&self) -> u32 {
        self.threads_stopped.load(Ordering::Acquire)
    }

    pub fn threads_flushed(&self) -> u32 {
        self.threads_flushed.load(Ordering::Acquire)
    }
}

/// Coordinates a single, idempotent shutdown sequence for the process.
pub struct ShutdownManager {
    shutdown_requested: AtomicBool,
    shutdown_completed: AtomicBool,
    phase: AtomicU32,
    last_signal: AtomicI32,
    last_reason: AtomicI32,
    request_count: AtomicU64,
    state: Arc<ShutdownState>,
    registry: Mutex<Option<Arc<ThreadRegistry>>>,
    drain_thread: Mutex<Option<DrainWorker>>,
    cancel_timer: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    wake: Mutex<Option<SyncSender<()>>>,
    start_ts: Mutex<Option<SystemTime>>,
    end_ts: Mutex<Option<SystemTime>>,
    files_synced: AtomicU64,
}

impl ShutdownManager {
    pub fn new(state: Arc<ShutdownState>) -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            shutdown_completed: AtomicBool::new(false),
            phase: AtomicU32::new(ShutdownPhase::Idle as u32),
            last_signal: AtomicI32::new(0),
            last_reason: AtomicI32::new(ShutdownReason::None as i32),
            request_count: AtomicU64::new(0),
            state,
            registry: Mutex::new(None),
            drain_thread: Mutex::new(None),
            cancel_timer: Mutex::new(None),
            wake: Mutex::new(None),
            start_ts: Mutex::new(None),
            end_ts: Mutex::new(None),
            files_synced: AtomicU64::new(0),
        }
    }

    pub fn set_registry(&self, registry: Arc<ThreadRegistry>) {
        *self.registry.lock().unwrap() = Some(registry);
    }

    pub fn set_drain_thread(&self, drain: DrainWorker) {
        *self.drain_thread.lock().unwrap() = Some(drain);
    }

    pub fn set_cancel_timer(&self, cancel_timer: impl Fn() + Send + Sync + 'static) {
        *self.cancel_timer.lock().unwrap() = Some(Box::new(cancel_timer));
    }

    /// Registers the sending half of a wakeup channel; the caller keeps the
    /// receiving half to park a main loop on. Stands in for the original's
    /// `shutdown_manager_set_wakeup_fds`.
    pub fn set_wakeup_channel(&self, tx: SyncSender<()>) {
        *self.wake.lock().unwrap() = Some(tx);
    }

    /// Requests shutdown. Only the first call advances the phase and
    /// returns `true`; every later call just counts toward `request_count`.
    pub fn request_shutdown(&self, reason: ShutdownReason, signal_number: i32) -> bool {
        self.request_count.fetch_add(1, Ordering::AcqRel);
        let phase_before = self.phase();

        let already_requested = self.shutdown_requested.swap(true, Ordering::AcqRel);
        #[cfg(debug_assertions)]
        debug_assert_idempotent_request!(already_requested, phase_before, self.phase());
        if already_requested {
            return false;
        }

        self.last_reason.store(reason as i32, Ordering::Release);
        self.last_signal.store(signal_number, Ordering::Release);
        *self.start_ts.lock().unwrap() = Some(SystemTime::now());
        self.advance_phase(ShutdownPhase::SignalReceived);
        self.signal_wakeup();
        true
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_completed.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u32(self.phase.load(Ordering::Acquire))
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Acquire)
    }

    pub fn last_signal(&self) -> i32 {
        self.last_signal.load(Ordering::Acquire)
    }

    pub fn last_reason(&self) -> ShutdownReason {
        ShutdownReason::from_i32(self.last_reason.load(Ordering::Acquire))
    }

    fn advance_phase(&self, next: ShutdownPhase) {
        let before = ShutdownPhase::from_u32(self.phase.swap(next as u32, Ordering::AcqRel));
        #[cfg(debug_assertions)]
        debug_assert_phase_monotonic!(before, next);
    }

    /// Runs the shutdown sequence: stop threads accepting new events,
    /// cancel any pending timer, drive the drain worker to a final flush,
    /// and record the completion timestamp. Idempotent — calling this
    /// again after completion is a no-op; calling it before
    /// `request_shutdown` is a `State` error.
    pub fn execute(&self) -> Result<(), ShutdownError> {
        if self.shutdown_completed.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.shutdown_requested.load(Ordering::Acquire) {
            return Err(ShutdownError::State(
                "execute called before request_shutdown".to_string(),
            ));
        }

        self.advance_phase(ShutdownPhase::StoppingThreads);
        if let Some(registry) = self.registry.lock().unwrap().as_ref() {
            for slot in 0..registry.capacity() {
                if registry.is_active(slot) {
                    self.state.mark_inactive(slot);
                }
            }
        }

        if let Some(cancel_timer) = self.cancel_timer.lock().unwrap().as_ref() {
            cancel_timer();
        }

        if let Some(registry) = self.registry.lock().unwrap().as_ref() {
            for slot in 0..registry.capacity() {
                if registry.is_active(slot) {
                    self.state.request_flush(slot);
                }
            }
        }

        self.advance_phase(ShutdownPhase::Draining);
        if let Some(mut drain) = self.drain_thread.lock().unwrap().take() {
            let _writer = drain.stop();
            self.files_synced.fetch_add(1, Ordering::AcqRel);
        }

        if let Some(registry) = self.registry.lock().unwrap().as_ref() {
            for slot in 0..registry.capacity() {
                if registry.is_active(slot) {
                    self.state.mark_flushed(slot);
                }
            }
        }

        #[cfg(debug_assertions)]
        debug_assert_completion_drained!(
            self.state.threads_stopped(),
            self.state.threads_flushed(),
            self.state.active_threads()
        );

        *self.end_ts.lock().unwrap() = Some(SystemTime::now());
        self.advance_phase(ShutdownPhase::Completed);
        self.shutdown_completed.store(true, Ordering::Release);
        Ok(())
    }

    pub fn print_summary(&self) {
        let elapsed = match (*self.start_ts.lock().unwrap(), *self.end_ts.lock().unwrap()) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        };
        tracing::info!(
            request_count = self.request_count(),
            reason = ?self.last_reason(),
            signal = self.last_signal(),
            threads_stopped = self.state.threads_stopped(),
            threads_flushed = self.state.threads_flushed(),
            files_synced = self.files_synced.load(Ordering::Acquire),
            elapsed_ms = elapsed.as_millis() as u64,
            "shutdown complete"
        );
    }

    /// Nudges whatever main loop is parked on the receiving half of the
    /// wakeup channel. A full channel (loop hasn't drained the previous
    /// nudge yet) is not an error — one pending wakeup is all a loop ever
    /// needs to notice a shutdown was requested.
    pub fn signal_wakeup(&self) {
        if let Some(tx) = self.wake.lock().unwrap().as_ref() {
            let _ = tx.try_send(());
        }
    }
}

/// Installs `SIGINT`/`SIGTERM` handlers that call
/// [`ShutdownManager::request_shutdown`].
///
/// Uses `signal_hook`'s iterator registration rather than a raw signal
/// handler: `Signals` internally runs its own self-pipe and hands delivered
/// signals to a dedicated thread via a blocking iterator, so the closure
/// below runs as ordinary thread code, not in actual signal-handler context
/// — it is free to take locks the way a real `sigaction` handler could not.
/// Unregisters on `uninstall` or `Drop`.
pub struct SignalHandler {
    manager: Arc<ShutdownManager>,
    handle: Mutex<Option<signal_hook::iterator::Handle>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    installed: AtomicBool,
    signal_count: Arc<AtomicU64>,
}

impl SignalHandler {
    pub fn new(manager: Arc<ShutdownManager>) -> Self {
        Self {
            manager,
            handle: Mutex::new(None),
            thread: Mutex::new(None),
            installed: AtomicBool::new(false),
            signal_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn install(&self) -> Result<(), ShutdownError> {
        if self.installed.swap(true, Ordering::AcqRel) {
            return Err(ShutdownError::Busy(
                "signal handler already installed".to_string(),
            ));
        }

        let signals = signal_hook::iterator::Signals::new([
            signal_hook::consts::SIGINT,
            signal_hook::consts::SIGTERM,
        ])
        .map_err(ShutdownError::IoFailure)?;
        let handle = signals.handle();

        let manager = Arc::clone(&self.manager);
        let count = Arc::clone(&self.signal_count);
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                count.fetch_add(1, Ordering::Relaxed);
                manager.request_shutdown(ShutdownReason::Signal, signal);
            }
        });

        *self.handle.lock().unwrap() = Some(handle);
        *self.thread.lock().unwrap() = Some(thread);
        Ok(())
    }

    pub fn uninstall(&self) {
        if !self.installed.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.close();
        }
        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
        }
    }

    pub fn signal_count(&self) -> u64 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.uninstall();
    }
}
