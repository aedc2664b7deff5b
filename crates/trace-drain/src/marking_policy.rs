//! Rule-based policy deciding whether an observed event should mark its
//! detail-lane window for selective persistence.
//!
//! Grounded on
//! `original_source/include/tracer_backend/selective_persistence/marking_policy.h`:
//! target (symbol vs. message), match kind (literal vs. regex), case
//! sensitivity, and the "regex compile failure demotes to literal match on
//! the same pattern" rule (`spec.md` §4.9).

use std::sync::atomic::{AtomicBool, Ordering};

use regex::{Regex, RegexBuilder};

/// Which probe field a rule evaluates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingTarget {
    Symbol,
    Message,
}

/// How a rule's pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingMatch {
    Literal,
    Regex,
}

/// A single marking rule, as supplied by CLI trigger definitions or a
/// config file.
#[derive(Debug, Clone)]
pub struct PatternDesc {
    pub target: MarkingTarget,
    pub match_kind: MarkingMatch,
    pub case_sensitive: bool,
    pub pattern: String,
    /// Only consulted when `target == Symbol`.
    pub module_name: Option<String>,
}

/// The fields of an observed event a marking rule can inspect. `symbol_name`
/// and `message` are best-effort strings derived from opaque captured
/// bytes: symbolization itself is out of scope (`spec.md` §2 Non-goals), so
/// the drain worker synthesizes a stand-in symbol name from `function_id`
/// and uses a signal's name as the message field when one is present.
pub struct MarkingProbe<'a> {
    pub symbol_name: Option<&'a str>,
    pub module_name: Option<&'a str>,
    pub message: Option<&'a str>,
}

enum CompiledMatch {
    Literal { pattern: String, case_sensitive: bool },
    Regex(Regex),
}

struct CompiledRule {
    target: MarkingTarget,
    module_name: Option<String>,
    matcher: CompiledMatch,
}

impl CompiledRule {
    fn compile(desc: &PatternDesc) -> Self {
        let matcher = match desc.match_kind {
            MarkingMatch::Literal => CompiledMatch::Literal {
                pattern: desc.pattern.clone(),
                case_sensitive: desc.case_sensitive,
            },
            MarkingMatch::Regex => RegexBuilder::new(&desc.pattern)
                .case_insensitive(!desc.case_sensitive)
                .build()
                .map(CompiledMatch::Regex)
                .unwrap_or_else(|err| {
                    tracing::warn!(
                        pattern = %desc.pattern,
                        error = %err,
                        "marking rule regex failed to compile, demoting to literal match"
                    );
                    CompiledMatch::Literal {
                        pattern: desc.pattern.clone(),
                        case_sensitive: desc.case_sensitive,
                    }
                }),
        };
        Self {
            target: desc.target,
            module_name: desc.module_name.clone(),
            matcher,
        }
    }

    fn evaluate(&self, probe: &MarkingProbe) -> bool {
        let subject = match self.target {
            MarkingTarget::Symbol => {
                if let Some(expected_module) = &self.module_name {
                    if probe.module_name != Some(expected_module.as_str()) {
                        return false;
                    }
                }
                probe.symbol_name
            }
            MarkingTarget::Message => probe.message,
        };
        let Some(subject) = subject else {
            return false;
        };
        match &self.matcher {
            CompiledMatch::Literal {
                pattern,
                case_sensitive,
            } => {
                if *case_sensitive {
                    subject.contains(pattern.as_str())
                } else {
                    subject.to_lowercase().contains(&pattern.to_lowercase())
                }
            }
            CompiledMatch::Regex(re) => re.is_match(subject),
        }
    }
}

/// Compiled set of marking rules. Matching short-circuits on the first rule
/// that hits.
pub struct MarkingPolicy {
    rules: Vec<CompiledRule>,
    enabled: AtomicBool,
}

impl MarkingPolicy {
    pub fn new(patterns: &[PatternDesc]) -> Self {
        Self {
            rules: patterns.iter().map(CompiledRule::compile).collect(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn pattern_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if any rule matches `probe`, short-circuiting on the
    /// first hit. Always false when the policy is disabled.
    pub fn matches(&self, probe: &MarkingProbe) -> bool {
        self.is_enabled() && self.rules.iter().any(|rule| rule.evaluate(probe))
    }
}
