//! Request argument translation.
//!
//! Built-in components declare their parameters under a namespaced name
//! (`component.param`), while a load request carries bare `param=value`
//! pairs. Translation happens in two stages:
//!
//! 1. [`split_args`] extracts `(param, value)` pairs from the raw string.
//! 2. [`translate`] prefixes each pair with the component name and hands it
//!    to a [`ParamSink`], turning every rejection into a diagnostic line.
//!
//! Nothing in here fails a request: unknown or malformed parameters are
//! reported and the initializer still runs.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the component name and the parameter name.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Errors reported by a [`ParamSink`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("unknown parameter '{0}'")]
    Unknown(String),

    #[error("invalid value '{value}' for parameter '{param}': {reason}")]
    InvalidValue {
        param: String,
        value: String,
        reason: String,
    },
}

/// The generic parameter-parsing collaborator.
pub trait ParamSink: Send + Sync {
    /// Apply one namespaced parameter (`component.param`).
    ///
    /// `value` is `None` for bare flags.
    fn apply(&self, component: &str, param: &str, value: Option<&str>) -> Result<(), ParamError>;
}

/// One `param[=value]` pair extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamPair {
    pub param: String,
    pub value: Option<String>,
}

impl ParamPair {
    /// Namespaced parameter name for `component`.
    pub fn namespaced(&self, component: &str) -> String {
        namespaced(component, &self.param)
    }
}

/// Build `component.param`.
pub fn namespaced(component: &str, param: &str) -> String {
    let mut out = String::with_capacity(component.len() + param.len() + 1);
    out.push_str(component);
    out.push(NAMESPACE_SEPARATOR);
    out.push_str(param);
    out
}

/// Stage 1 failure: the raw string could not be split completely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unterminated quote in arguments starting at byte {offset}")]
pub struct SplitError {
    pub offset: usize,
}

/// Split a raw argument string into pairs.
///
/// Pairs are separated by ASCII whitespace or commas outside double quotes.
/// Quotes are stripped from the result and dashes in parameter names are
/// normalized to underscores. On an unterminated quote the pairs parsed so
/// far are returned alongside the error.
pub fn split_args(raw: &str) -> (Vec<ParamPair>, Option<SplitError>) {
    let mut pairs = Vec::new();
    let mut token = String::new();
    let mut in_quotes = false;
    let mut quote_start = 0;

    let flush = |token: &mut String, pairs: &mut Vec<ParamPair>| {
        if token.is_empty() {
            return;
        }
        let (param, value) = match token.split_once('=') {
            Some((p, v)) => (p, Some(v.to_string())),
            None => (token.as_str(), None),
        };
        if !param.is_empty() {
            pairs.push(ParamPair {
                param: param.replace('-', "_"),
                value,
            });
        }
        token.clear();
    };

    for (offset, ch) in raw.char_indices() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quote_start = offset;
            }
            c if !in_quotes && (c.is_ascii_whitespace() || c == ',') => {
                flush(&mut token, &mut pairs);
            }
            c => token.push(c),
        }
    }

    if in_quotes {
        return (pairs, Some(SplitError { offset: quote_start }));
    }
    flush(&mut token, &mut pairs);
    (pairs, None)
}

/// Translate `raw` for `component` and forward each pair to `sink`.
///
/// Returns the diagnostic lines produced; an empty vector means every
/// parameter was applied.
pub fn translate(component: &str, raw: &str, sink: &dyn ParamSink) -> Vec<String> {
    let (pairs, split_error) = split_args(raw);
    let mut diagnostics = Vec::new();

    for pair in &pairs {
        let param = pair.namespaced(component);
        match sink.apply(component, &param, pair.value.as_deref()) {
            Ok(()) => {
                tracing::debug!("{}: applied parameter '{}'", component, param);
            }
            Err(ParamError::Unknown(_)) => {
                diagnostics.push(format!(
                    "{}: unknown parameter '{}' ignored",
                    component, pair.param
                ));
            }
            Err(err) => diagnostics.push(format!("{}: {}", component, err)),
        }
    }

    if let Some(err) = split_error {
        diagnostics.push(format!("{}: failed to parse args: {}", component, err));
    }
    diagnostics
}

/// Sink that knows no parameters at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParams;

impl ParamSink for NoParams {
    fn apply(&self, _component: &str, param: &str, _value: Option<&str>) -> Result<(), ParamError> {
        Err(ParamError::Unknown(param.to_string()))
    }
}

/// Declared type of a component parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Bool,
    Int,
    Str,
}

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", if *b { "Y" } else { "N" }),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug)]
struct Declared {
    kind: ParamKind,
    value: Option<ParamValue>,
}

/// In-memory parameter store keyed by namespaced name.
///
/// Components declare their parameters up front; requests may then set them.
#[derive(Debug, Default)]
pub struct ParamTable {
    params: RwLock<HashMap<String, Declared>>,
}

impl ParamTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `component.param` with the given kind.
    pub fn declare(&self, component: &str, param: &str, kind: ParamKind) {
        self.params
            .write()
            .insert(namespaced(component, param), Declared { kind, value: None });
    }

    /// Builder-style [`declare`](Self::declare).
    pub fn with(self, component: &str, param: &str, kind: ParamKind) -> Self {
        self.declare(component, param, kind);
        self
    }

    /// Current value of a namespaced parameter, if it was ever set.
    pub fn get(&self, param: &str) -> Option<ParamValue> {
        self.params.read().get(param).and_then(|d| d.value.clone())
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.read().len()
    }

    /// Whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.params.read().is_empty()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "y" | "Y" | "1" | "yes" | "true" | "on" => Some(true),
        "n" | "N" | "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

impl ParamSink for ParamTable {
    fn apply(&self, _component: &str, param: &str, value: Option<&str>) -> Result<(), ParamError> {
        let mut params = self.params.write();
        let declared = params
            .get_mut(param)
            .ok_or_else(|| ParamError::Unknown(param.to_string()))?;

        let invalid = |reason: &str| ParamError::InvalidValue {
            param: param.to_string(),
            value: value.unwrap_or_default().to_string(),
            reason: reason.to_string(),
        };

        let parsed = match (declared.kind, value) {
            (ParamKind::Bool, None) => ParamValue::Bool(true),
            (ParamKind::Bool, Some(v)) => {
                ParamValue::Bool(parse_bool(v).ok_or_else(|| invalid("expected a boolean"))?)
            }
            (ParamKind::Int, Some(v)) => ParamValue::Int(
                v.parse::<i64>()
                    .map_err(|_| invalid("expected an integer"))?,
            ),
            (ParamKind::Str, Some(v)) => ParamValue::Str(v.to_string()),
            (_, None) => return Err(invalid("a value is required")),
        };

        declared.value = Some(parsed);
        Ok(())
    }
}
