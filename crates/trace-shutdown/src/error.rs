//! Errors returned by the shutdown control plane.

use thiserror::Error;

/// Control-plane errors for [`crate::ShutdownManager`] and [`crate::Timer`].
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// A caller-supplied argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation conflicts with one already in progress.
    #[error("busy: {0}")]
    Busy(String),

    /// The operation is not valid in the current state/phase.
    #[error("invalid state: {0}")]
    State(String),

    /// A required resource (signal slot, thread) was exhausted.
    #[error("exhausted: {0}")]
    Exhaustion(String),

    /// An I/O operation (pipe, fsync) failed.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// An unrecoverable condition; the caller should abort shutdown.
    #[error("fatal: {0}")]
    Fatal(String),
}
