//! Lock-free SPSC/MPSC ring buffers and per-thread lane pools for a
//! low-overhead function-call tracer.
//!
//! - [`Ring<T>`] is the core single-producer single-consumer building block:
//!   128-byte cache-aligned, unbounded-sequence-number ABA-proof, with a
//!   zero-copy reserve/commit API and batch consumption.
//! - [`Channel<T>`] composes many `Ring<T>`s (one per producer) into an MPSC
//!   channel via ring decomposition, used for the process-global fallback
//!   ring that every capture mode can fall back to.
//! - [`Lane<T>`] is a per-thread pool of `Ring<T>`s with lock-free
//!   active-ring handoff to a drain consumer.
//!
//! # Example
//!
//! ```
//! use trace_ring::{Channel, RingConfig};
//!
//! let channel = Channel::<u64>::new(RingConfig::default());
//! let producer = channel.register().unwrap();
//! producer.push(42);
//!
//! let consumed = channel.consume_all(|item: &u64| {
//!     assert_eq!(*item, 42);
//! });
//! assert_eq!(consumed, 1);
//! ```

mod backoff;
mod channel;
mod config;
mod event;
mod invariants;
mod lane;
mod metrics;
mod reservation;
mod ring;

pub use backoff::Backoff;
pub use channel::{Channel, ChannelError, Producer};
pub use config::{LaneConfig, RingConfig, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use event::{
    DetailEvent, EventKind, IndexEvent, RegisterFile, SignalDelivery, MAX_REGISTERS,
    MAX_STACK_SNAPSHOT,
};
pub use lane::Lane;
pub use metrics::{Metrics, MetricsSnapshot};
pub use reservation::Reservation;
pub use ring::Ring;
