/// Configuration for a [`Ring`](crate::Ring) or [`Lane`](crate::Lane).
///
/// Capacity is always a power of two. Unlike the upstream channel config this
/// never panics on a bad `ring_bits` value: the capture path must never abort
/// the host process, so construction rounds down to the nearest valid power
/// of two instead (`spec.md` boundary behavior: "capacity values get rounded
/// down to the nearest power of two (>= 2)").
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    /// Ring buffer size as a power of 2 (default: 10 = 1024 slots).
    pub ring_bits: u8,
    /// Maximum number of producers a pool built on top of this config serves.
    pub max_producers: usize,
    /// Enable metrics collection (slight overhead).
    pub enable_metrics: bool,
}

impl RingConfig {
    /// Creates a new configuration, clamping `ring_bits` into `[1, 20]` and
    /// `max_producers` into `[1, 128]` rather than panicking.
    pub const fn new(ring_bits: u8, max_producers: usize, enable_metrics: bool) -> Self {
        let ring_bits = if ring_bits == 0 {
            1
        } else if ring_bits > 20 {
            20
        } else {
            ring_bits
        };
        let max_producers = if max_producers == 0 {
            1
        } else if max_producers > 128 {
            128
        } else {
            max_producers
        };

        Self {
            ring_bits,
            max_producers,
            enable_metrics,
        }
    }

    /// Returns the capacity of the ring buffer.
    #[inline]
    pub const fn capacity(&self) -> usize {
        1 << self.ring_bits
    }

    /// Returns the mask for index wrapping.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.capacity() - 1
    }

    /// Sets the number of producers a pool built on this config can serve.
    #[must_use]
    pub const fn with_max_producers(mut self, max_producers: usize) -> Self {
        self.max_producers = if max_producers == 0 {
            1
        } else if max_producers > 128 {
            128
        } else {
            max_producers
        };
        self
    }

    /// Enables or disables metrics collection.
    #[must_use]
    pub const fn with_metrics(mut self, enable_metrics: bool) -> Self {
        self.enable_metrics = enable_metrics;
        self
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_bits: 10, // 1024 slots
            max_producers: 16,
            enable_metrics: false,
        }
    }
}

/// A small pool config: number of rings per lane and bits-per-ring.
///
/// Mirrors `spec.md` §3 Lane: "Holds `P` Rings (typically 4-8)".
#[derive(Debug, Clone, Copy)]
pub struct LaneConfig {
    /// Per-ring configuration.
    pub ring: RingConfig,
    /// Number of rings in the pool (P). Clamped into `[2, 64]`.
    pub pool_size: usize,
}

impl LaneConfig {
    pub const fn new(ring: RingConfig, pool_size: usize) -> Self {
        let pool_size = if pool_size < 2 {
            2
        } else if pool_size > 64 {
            64
        } else {
            pool_size
        };
        Self { ring, pool_size }
    }
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self::new(RingConfig::default(), 6)
    }
}

/// Low latency configuration (256 slots, fits in L1 cache).
pub const LOW_LATENCY_CONFIG: RingConfig = RingConfig::new(8, 16, false);

/// High throughput configuration (64K slots, 32 max producers).
pub const HIGH_THROUGHPUT_CONFIG: RingConfig = RingConfig::new(16, 32, false);
