//! Runtime triggers supplied via repeated `--trigger` flags.
//!
//! Grounded on `cli_parser.h`'s `TriggerType`/`TriggerDefinition`/
//! `TriggerList`: a trigger is either a symbol name (optionally scoped to a
//! module), a crash, or a time offset in seconds. `time` triggers arm
//! `trace-shutdown`'s [`trace_shutdown::Timer`]; `symbol`/`crash` triggers
//! become [`trace_drain::marking_policy::PatternDesc`] rules consulted by
//! the drain worker's selective persistence window.

use std::time::Duration;

use trace_drain::{MarkingMatch, MarkingTarget, PatternDesc};

use crate::error::CliError;

/// One parsed `--trigger` value.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// `symbol[:module]=<name>` — fires when the named symbol is hit.
    Symbol {
        module: Option<String>,
        name: String,
    },
    /// `crash` — fires on an unhandled signal in the target.
    Crash,
    /// `time=<seconds>` — fires after the given number of seconds.
    Time(Duration),
}

impl Trigger {
    /// Parses one `--trigger` value, e.g. `symbol=foo`, `symbol:libc.so=malloc`,
    /// `crash`, or `time=30`.
    pub fn parse(raw: &str) -> Result<Self, CliError> {
        if raw == "crash" {
            return Ok(Trigger::Crash);
        }

        let (kind, value) = raw.split_once('=').ok_or_else(|| {
            CliError::InvalidArgument(format!("trigger '{raw}' must be 'type=value' or 'crash'"))
        })?;

        match kind {
            "time" => {
                let seconds: f64 = value.parse().map_err(|_| {
                    CliError::InvalidArgument(format!("invalid trigger time '{value}'"))
                })?;
                if seconds <= 0.0 {
                    return Err(CliError::InvalidArgument(
                        "trigger time must be positive".to_string(),
                    ));
                }
                Ok(Trigger::Time(Duration::from_secs_f64(seconds)))
            }
            "symbol" => Ok(Trigger::Symbol {
                module: None,
                name: value.to_string(),
            }),
            other if other.starts_with("symbol:") => {
                let module = other.trim_start_matches("symbol:").to_string();
                Ok(Trigger::Symbol {
                    module: Some(module),
                    name: value.to_string(),
                })
            }
            other => Err(CliError::InvalidArgument(format!(
                "unknown trigger type '{other}'"
            ))),
        }
    }

    /// The symbol/crash triggers in `triggers`, as marking-policy rules.
    /// Time triggers are not patterns and are dropped by this conversion;
    /// callers extract them separately via [`Trigger::durations`].
    pub fn to_pattern_descs(triggers: &[Trigger]) -> Vec<PatternDesc> {
        triggers
            .iter()
            .filter_map(|t| match t {
                Trigger::Symbol { module, name } => Some(PatternDesc {
                    target: MarkingTarget::Symbol,
                    match_kind: MarkingMatch::Literal,
                    case_sensitive: true,
                    pattern: name.clone(),
                    module_name: module.clone(),
                }),
                Trigger::Crash | Trigger::Time(_) => None,
            })
            .collect()
    }

    /// The shortest `time` trigger in `triggers`, if any, used to arm the
    /// drain-deadline timer.
    pub fn shortest_duration(triggers: &[Trigger]) -> Option<Duration> {
        triggers
            .iter()
            .filter_map(|t| match t {
                Trigger::Time(d) => Some(*d),
                _ => None,
            })
            .min()
    }
}
