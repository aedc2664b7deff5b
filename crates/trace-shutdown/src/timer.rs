//! Single-shot deadline timer used to bound how long the tracer waits for a
//! graceful drain before forcing a shutdown.
//!
//! Grounded on `original_source/.../timer/timer.c`'s singleton timer thread:
//! same `init`/`start`/`cancel`/`remaining_ms`/`is_active`/`cleanup`
//! surface and the same bound on cancellation latency (at most one poll
//! interval after `cancel` returns), but expressed as an owned value parked
//! on a `Condvar` instead of a global atomics-only busy-poll loop.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::ShutdownError;
#[cfg(debug_assertions)]
use crate::invariants::debug_assert_callback_once;

struct TimerState {
    active: bool,
    cancel_requested: bool,
    deadline: Instant,
    fire_count: u64,
}

struct TimerShared {
    state: Mutex<TimerState>,
    cv: Condvar,
}

/// Fires a caller-supplied callback at most once, `duration_ms` after
/// `start`, unless cancelled first.
pub struct Timer {
    shared: Arc<TimerShared>,
    poll_interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// `poll_interval` bounds how promptly `cancel` takes effect: the
    /// background thread wakes at least this often to recheck
    /// `cancel_requested` even without an explicit notify.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(TimerShared {
                state: Mutex::new(TimerState {
                    active: false,
                    cancel_requested: false,
                    deadline: Instant::now(),
                    fire_count: 0,
                }),
                cv: Condvar::new(),
            }),
            poll_interval,
            handle: Mutex::new(None),
        }
    }

    /// Starts the timer. Fails with `Busy` if already active, or
    /// `InvalidArgument` if `duration_ms` is zero.
    pub fn start(
        &self,
        duration_ms: u64,
        on_fire: impl FnOnce() + Send + 'static,
    ) -> Result<(), ShutdownError> {
        if duration_ms == 0 {
            return Err(ShutdownError::InvalidArgument(
                "duration_ms must be nonzero".to_string(),
            ));
        }

        let mut handle_guard = self.handle.lock().unwrap();
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.active {
                return Err(ShutdownError::Busy("timer already active".to_string()));
            }
            state.active = true;
            state.cancel_requested = false;
            state.deadline = Instant::now() + Duration::from_millis(duration_ms);
        }

        let shared = Arc::clone(&self.shared);
        let poll_interval = self.poll_interval;
        *handle_guard = Some(std::thread::spawn(move || {
            let mut state = shared.state.lock().unwrap();
            loop {
                if state.cancel_requested {
                    state.active = false;
                    return;
                }
                let now = Instant::now();
                if now >= state.deadline {
                    break;
                }
                let wait = (state.deadline - now).min(poll_interval);
                state = shared.cv.wait_timeout(state, wait).unwrap().0;
            }

            state.fire_count += 1;
            #[cfg(debug_assertions)]
            debug_assert_callback_once!(state.fire_count);
            state.active = false;
            drop(state);
            on_fire();
        }));

        Ok(())
    }

    /// Requests cancellation of the active timer, if any. Idempotent: a
    /// timer that isn't active is a no-op, not an error.
    pub fn cancel(&self) -> Result<(), ShutdownError> {
        let mut state = self.shared.state.lock().unwrap();
        if !state.active {
            return Ok(());
        }
        state.cancel_requested = true;
        drop(state);
        self.shared.cv.notify_all();
        Ok(())
    }

    pub fn remaining_ms(&self) -> u64 {
        let state = self.shared.state.lock().unwrap();
        if !state.active {
            return 0;
        }
        state
            .deadline
            .saturating_duration_since(Instant::now())
            .as_millis() as u64
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().unwrap().active
    }

    /// Cancels any active timer and joins its thread.
    pub fn cleanup(&self) {
        let _ = self.cancel();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cleanup();
    }
}
