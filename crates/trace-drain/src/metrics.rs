//! Drain worker metrics.
//!
//! Field subset grounded on
//! `original_source/include/tracer_backend/drain_thread/drain_thread.h`'s
//! `DrainMetrics` (per-thread wait/throughput/CPU fields scoped out — see
//! `DESIGN.md` — the counters that drive `spec.md` §4.7/§8's tested
//! behaviors are kept). Atomics-based per `trace-ring::Metrics`'s
//! convention: the drain worker is the sole writer, but metrics are read
//! concurrently by a status query.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DrainMetrics {
    cycles_total: AtomicU64,
    cycles_idle: AtomicU64,
    rings_total: AtomicU64,
    rings_index: AtomicU64,
    rings_detail: AtomicU64,
    fairness_switches: AtomicU64,
    sleeps: AtomicU64,
    yields: AtomicU64,
    final_drains: AtomicU64,
    total_sleep_us: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainMetricsSnapshot {
    pub cycles_total: u64,
    pub cycles_idle: u64,
    pub rings_total: u64,
    pub rings_index: u64,
    pub rings_detail: u64,
    pub fairness_switches: u64,
    pub sleeps: u64,
    pub yields: u64,
    pub final_drains: u64,
    pub total_sleep_us: u64,
}

impl DrainMetrics {
    pub fn snapshot(&self) -> DrainMetricsSnapshot {
        DrainMetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycles_idle: self.cycles_idle.load(Ordering::Relaxed),
            rings_total: self.rings_total.load(Ordering::Relaxed),
            rings_index: self.rings_index.load(Ordering::Relaxed),
            rings_detail: self.rings_detail.load(Ordering::Relaxed),
            fairness_switches: self.fairness_switches.load(Ordering::Relaxed),
            sleeps: self.sleeps.load(Ordering::Relaxed),
            yields: self.yields.load(Ordering::Relaxed),
            final_drains: self.final_drains.load(Ordering::Relaxed),
            total_sleep_us: self.total_sleep_us.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add_cycle(&self, idle: bool) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        if idle {
            self.cycles_idle.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn add_ring(&self, is_detail: bool) {
        self.rings_total.fetch_add(1, Ordering::Relaxed);
        if is_detail {
            self.rings_detail.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rings_index.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn add_fairness_switch(&self) {
        self.fairness_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_sleep(&self, micros: u64) {
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        self.total_sleep_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn add_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_final_drain(&self) {
        self.final_drains.fetch_add(1, Ordering::Relaxed);
    }
}

/// Jain's fairness index over per-slot serviced-event counts, reported
/// separately from the atomics above since it is computed from a snapshot
/// rather than accumulated incrementally. `spec.md` §4.7 targets ≥ 0.9
/// under balanced load.
pub fn jains_fairness_index(serviced: &[u64]) -> f64 {
    if serviced.is_empty() {
        return 1.0;
    }
    let n = serviced.len() as f64;
    let sum: f64 = serviced.iter().map(|&x| x as f64).sum();
    let sum_sq: f64 = serviced.iter().map(|&x| (x as f64).powi(2)).sum();
    if sum_sq == 0.0 {
        return 1.0;
    }
    (sum * sum) / (n * sum_sq)
}
