//! Background drain worker: moves events out of per-thread lanes and the
//! process-global rings, applies selective persistence to detail rings, and
//! writes everything to `events.atf` / `window_metadata.jsonl` / `manifest.json`.

pub mod config;
pub mod drain_worker;
pub mod marking_policy;
pub mod metrics;
pub mod persistence_window;
pub mod selective_persistence;
pub mod writer;

pub use config::DrainConfig;
pub use drain_worker::{DrainError, DrainState, DrainWorker};
pub use marking_policy::{MarkingMatch, MarkingPolicy, MarkingProbe, MarkingTarget, PatternDesc};
pub use metrics::{jains_fairness_index, DrainMetrics, DrainMetricsSnapshot};
pub use persistence_window::SelectivePersistenceWindow;
pub use selective_persistence::{SelectivePersistence, SelectivePersistenceMetrics};
pub use writer::{Writer, WriterConfig, WriterError};
