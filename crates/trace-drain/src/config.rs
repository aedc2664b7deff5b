//! Tunables for [`crate::drain_worker::DrainWorker`].
//!
//! Field list grounded verbatim on
//! `original_source/include/tracer_backend/drain_thread/drain_thread.h`'s
//! `DrainConfig`.

use std::time::Duration;

/// Configuration for the drain worker's poll loop and fair scheduler.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Sleep duration when idle; zero means busy-loop via `sched_yield`.
    pub poll_interval_us: u32,
    /// Max rings to consume from a lane per visit (0 = unlimited).
    pub max_batch_size: u32,
    /// Rings to process before rotating to the next lane (0 = unlimited).
    pub fairness_quantum: u32,
    /// Call `yield_now` instead of sleeping when idle.
    pub yield_on_idle: bool,
    /// Max threads to drain per cycle (0 = unlimited).
    pub max_threads_per_cycle: u32,
    /// Max events per thread per cycle (0 = unlimited).
    pub max_events_per_thread: u32,
    /// Time between idle cycles.
    pub iteration_interval_ms: u32,
    /// Enable the credit-based fair thread selection algorithm.
    pub enable_fair_scheduling: bool,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 500,
            max_batch_size: 16,
            fairness_quantum: 4,
            yield_on_idle: true,
            max_threads_per_cycle: 0,
            max_events_per_thread: 0,
            iteration_interval_ms: 1,
            enable_fair_scheduling: true,
        }
    }
}

impl DrainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us as u64)
    }
}
