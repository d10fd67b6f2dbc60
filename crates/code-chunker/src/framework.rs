//! Call-expression classification.
//!
//! The core ships no rules; framework knowledge arrives through configuration,
//! either as explicit [`FrameworkRule`]s or as named [`FrameworkPack`]s.

use crate::error::{ChunkerError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One row of the rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkRule {
    /// Regex matched against the callee text, e.g. `^(app|router)\.(get|post)$`
    pub callee: String,
    /// Label recorded on matching units (`route`, `plugin`, ...)
    pub call_type: String,
    /// Matching calls are never merged or split
    #[serde(default)]
    pub atomic: bool,
    /// Minimum number of call arguments
    #[serde(default)]
    pub min_args: usize,
}

impl FrameworkRule {
    pub fn new(callee: impl Into<String>, call_type: impl Into<String>, atomic: bool) -> Self {
        Self {
            callee: callee.into(),
            call_type: call_type.into(),
            atomic,
            min_args: 0,
        }
    }

    /// Builder: require at least `min_args` arguments
    #[must_use]
    pub const fn min_args(mut self, min_args: usize) -> Self {
        self.min_args = min_args;
        self
    }
}

/// Built-in rule packs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkPack {
    Fastify,
    Express,
}

const HTTP_VERBS: &str = "get|post|put|patch|delete|head|options|all";

impl FrameworkPack {
    pub fn rules(self) -> Vec<FrameworkRule> {
        match self {
            Self::Fastify => vec![
                FrameworkRule::new(
                    format!(r"^(fastify|app|server|instance)\.({HTTP_VERBS})$"),
                    "route",
                    true,
                )
                .min_args(2),
                FrameworkRule::new(r"^(fastify|app|server|instance)\.route$", "route", true),
                FrameworkRule::new(
                    r"^(fastify|app|server|instance)\.register$",
                    "plugin",
                    false,
                ),
                FrameworkRule::new(
                    r"^(fastify|app|server|instance)\.(addHook|decorate|decorateRequest|decorateReply|setErrorHandler)$",
                    "hook",
                    false,
                ),
            ],
            Self::Express => vec![
                FrameworkRule::new(
                    format!(r"^(app|router|api)\.({HTTP_VERBS})$"),
                    "route",
                    true,
                )
                .min_args(2),
                FrameworkRule::new(
                    format!(r"^(app|router)\.route\(.*\)(\.({HTTP_VERBS}))+$"),
                    "route",
                    true,
                ),
                FrameworkRule::new(r"^(app|router)\.use$", "middleware", false),
            ],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fastify" => Some(Self::Fastify),
            "express" => Some(Self::Express),
            _ => None,
        }
    }
}

/// Classification of a matched call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMatch {
    pub call_type: String,
    pub is_atomic: bool,
}

#[derive(Debug)]
struct CompiledRule {
    callee: Regex,
    call_type: String,
    atomic: bool,
    min_args: usize,
}

/// Compiled rule table; first matching rule wins
#[derive(Debug, Default)]
pub struct FrameworkPatternMatcher {
    rules: Vec<CompiledRule>,
}

impl FrameworkPatternMatcher {
    /// Compile explicit rules followed by pack rules
    pub fn new(rules: &[FrameworkRule], packs: &[FrameworkPack]) -> Result<Self> {
        let pack_rules: Vec<FrameworkRule> = packs.iter().flat_map(|pack| pack.rules()).collect();

        let compiled = rules
            .iter()
            .chain(pack_rules.iter())
            .map(|rule| {
                let callee = Regex::new(&rule.callee).map_err(|e| {
                    ChunkerError::invalid_config(format!(
                        "framework rule `{}` has an invalid callee pattern: {e}",
                        rule.callee
                    ))
                })?;
                Ok(CompiledRule {
                    callee,
                    call_type: rule.call_type.clone(),
                    atomic: rule.atomic,
                    min_args: rule.min_args,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules: compiled })
    }

    /// Matcher that never matches
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify a call by its callee text and argument count
    pub fn classify(&self, callee: &str, arg_count: usize) -> Option<CallMatch> {
        let callee = compact_callee(callee);
        self.rules
            .iter()
            .find(|rule| arg_count >= rule.min_args && rule.callee.is_match(&callee))
            .map(|rule| CallMatch {
                call_type: rule.call_type.clone(),
                is_atomic: rule.atomic,
            })
    }
}

/// Drop whitespace so multi-line chains (`app\n  .get`) match single-line rules.
fn compact_callee(callee: &str) -> String {
    callee.chars().filter(|ch| !ch.is_whitespace()).collect()
}
