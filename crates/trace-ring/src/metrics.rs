use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for a single [`Ring`](crate::Ring).
///
/// All increments use `Relaxed` ordering: these are observational counters,
/// not synchronization points (`spec.md` §5: "counters are relaxed").
#[derive(Debug, Default)]
pub struct Metrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    batches_sent: AtomicU64,
    batches_received: AtomicU64,
    reserve_spins: AtomicU64,
    overflow_count: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_messages_sent(&self, n: u64) {
        self.messages_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_messages_received(&self, n: u64) {
        self.messages_received.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_batches_sent(&self, n: u64) {
        self.batches_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_batches_received(&self, n: u64) {
        self.batches_received.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_reserve_spins(&self, n: u64) {
        self.reserve_spins.fetch_add(n, Ordering::Relaxed);
    }

    /// Monotonic overflow counter (`spec.md` §3 Ring header field).
    pub(crate) fn add_overflow(&self, n: u64) {
        self.overflow_count.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_received: self.batches_received.load(Ordering::Relaxed),
            reserve_spins: self.reserve_spins.load(Ordering::Relaxed),
            overflow_count: self.overflow_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`Metrics`], safe to copy and compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub batches_sent: u64,
    pub batches_received: u64,
    pub reserve_spins: u64,
    pub overflow_count: u64,
}
