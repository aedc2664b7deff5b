//! Command-line surface: `trace spawn <executable> [args...]` and
//! `trace attach <pid>`, plus the shared capture flags.
//!
//! Grounded on `original_source/include/tracer_backend/cli_parser.h`'s
//! `ExecutionMode`/`TracerConfig` field list and on `src/controller/main.c`'s
//! actual flag handling (`--output`, `--exclude`, `--duration`), expressed
//! in the `clap::Parser`/`clap::Subcommand` derive idiom (`other_examples`
//! stomata-cli's `#[derive(Parser)]` / `#[command(...)]` style).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::CliError;
use crate::trigger::Trigger;

#[derive(Parser, Debug)]
#[command(name = "trace", version, about = "Low-overhead function-call tracer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory to write `events.atf`, `window_metadata.jsonl`, and
    /// `manifest.json` into. Defaults to `./trace-output`.
    #[arg(long, global = true, default_value = "trace-output")]
    pub output: PathBuf,

    /// Comma-separated module names to exclude from capture, or set via
    /// `ADA_EXCLUDE`. The flag takes precedence over the environment
    /// variable.
    #[arg(long, global = true)]
    pub exclude: Option<String>,

    /// Stop tracing after this many seconds. Unset means trace until the
    /// target exits or `SIGINT`/`SIGTERM` is received.
    #[arg(long, global = true)]
    pub duration: Option<f64>,

    /// Seconds of detail-lane history to retain before a trigger fires.
    #[arg(long = "pre-roll-sec", global = true, default_value_t = 5.0)]
    pub pre_roll: f64,

    /// Seconds of detail-lane history to retain after a trigger fires.
    #[arg(long = "post-roll-sec", global = true, default_value_t = 5.0)]
    pub post_roll: f64,

    /// Bytes of stack to snapshot per detail event.
    #[arg(long, global = true, default_value_t = 256)]
    pub stack_bytes: u32,

    /// A marking-policy trigger (`symbol=<name>`, `symbol:<module>=<name>`,
    /// `crash`, or `time=<seconds>`). May be repeated.
    #[arg(long = "trigger", global = true)]
    pub triggers: Vec<String>,

    /// Disable the cross-process thread registry; fall back to the
    /// process-global ring for every thread. Defaults from
    /// `ADA_DISABLE_REGISTRY` if that variable is set to a non-empty value.
    #[arg(long, global = true, default_value_t = false)]
    pub disable_registry: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch `executable` suspended, attach, and resume it.
    Spawn {
        executable: String,
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Attach to an already-running process by pid.
    Attach { pid: u32 },
}

impl Cli {
    /// Resolves the effective exclude list: `--exclude` wins over
    /// `ADA_EXCLUDE`, matching `main.c`'s `setenv` precedence.
    pub fn exclude_modules(&self) -> Vec<String> {
        let raw = self
            .exclude
            .clone()
            .or_else(|| std::env::var("ADA_EXCLUDE").ok());
        raw.map(|csv| csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Resolves whether the thread registry is disabled: `--disable-registry`
    /// wins over `ADA_DISABLE_REGISTRY`.
    pub fn registry_disabled(&self) -> bool {
        self.disable_registry || std::env::var("ADA_DISABLE_REGISTRY").is_ok_and(|v| !v.is_empty())
    }

    /// Parses every `--trigger` value, failing on the first malformed one.
    pub fn parsed_triggers(&self) -> Result<Vec<Trigger>, CliError> {
        self.triggers.iter().map(|raw| Trigger::parse(raw)).collect()
    }

    /// Duration in milliseconds for the drain-deadline timer: the shorter
    /// of `--duration` and any `time=` trigger, if either is present.
    pub fn duration_ms(&self, triggers: &[Trigger]) -> Option<u64> {
        let from_flag = self.duration.filter(|s| *s > 0.0).map(std::time::Duration::from_secs_f64);
        let from_trigger = Trigger::shortest_duration(triggers);
        match (from_flag, from_trigger) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        }
        .map(|d| d.as_millis() as u64)
    }
}
