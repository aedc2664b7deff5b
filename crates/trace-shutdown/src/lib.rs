//! Coordinated shutdown for the tracer process.
//!
//! Ties together the phase-based [`ShutdownManager`] sequence, a
//! [`SignalHandler`] for `SIGINT`/`SIGTERM`, and an optional drain-deadline
//! [`Timer`] so that a signal, an elapsed timer, or a manual call all
//! converge on the same idempotent shutdown path.

mod error;
mod invariants;
mod shutdown_manager;
mod timer;

pub use error::ShutdownError;
pub use shutdown_manager::{
    ShutdownManager, ShutdownPhase, ShutdownReason, ShutdownState, ShutdownThreadState,
    SignalHandler,
};
pub use timer::Timer;
