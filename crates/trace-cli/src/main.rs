//! `trace` — the command-line entry point that wires `trace-ring`,
//! `trace-registry`, `trace-drain`, and `trace-shutdown` into a standalone
//! capture session.
//!
//! Grounded on `original_source/src/controller/main.c`'s `main`: argument
//! mode (`spawn`/`attach`), option parsing (`--output`/`--exclude`/
//! `--duration`), signal-driven and timer-driven shutdown, and a
//! stats-printing monitor loop, translated from C's `goto cleanup` control
//! flow into ordinary `?`-propagated `Result`s plus RAII `Drop` cleanup
//! (`SignalHandler`/`Timer`'s own `Drop` impls).

mod cli;
mod error;
mod run;
mod trigger;

use clap::Parser;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();

    match run::run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "tracer exited with an error");
            std::process::exit(err.exit_code());
        }
    }
}
