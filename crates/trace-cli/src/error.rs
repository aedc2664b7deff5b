//! Errors surfaced by the `trace` binary's argument parsing and session
//! setup, ahead of anything control-plane related (those use each crate's
//! own `thiserror` enum, e.g. `trace_drain::WriterError`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("process state error: {0}")]
    State(String),

    #[error(transparent)]
    Shutdown(#[from] trace_shutdown::ShutdownError),

    #[error(transparent)]
    Writer(#[from] trace_drain::WriterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Maps an error to the process exit code `main` returns, mirroring the
    /// original controller's `exit_code = 1` convention on any failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
