//! Scope normalization and the required-vs-granted comparison.
//!
//! Normalization rules (both for route requirements and granted scopes):
//! - absent / `null` -> empty set
//! - a bare string   -> singleton set
//! - a list of strings -> that list, order preserved
//! - anything else   -> `ScopeError` (a configuration error, not a client error)

use serde_json::Value;
use thiserror::Error;

/// Granted scope that satisfies every requirement.
pub const WILDCARD_SCOPE: &str = "all";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scopes must be a string or a list of strings, got {0}")]
    InvalidShape(&'static str),
    #[error("scope list entry {index} is not a string")]
    NonStringEntry { index: usize },
}

/// The first required scope the identity does not hold.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing scope {scope}")]
pub struct MissingScope {
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_value(value: Option<&Value>) -> Result<Self, ScopeError> {
        match value {
            None | Some(Value::Null) => Ok(Self::empty()),
            Some(Value::String(s)) => Ok(Self(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    item.as_str()
                        .map(str::to_owned)
                        .ok_or(ScopeError::NonStringEntry { index })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            Some(other) => Err(ScopeError::InvalidShape(json_type_name(other))),
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for ScopeSet {
    fn from(scope: &str) -> Self {
        Self(vec![scope.to_owned()])
    }
}

impl From<Vec<String>> for ScopeSet {
    fn from(scopes: Vec<String>) -> Self {
        Self(scopes)
    }
}

impl<'a> FromIterator<&'a str> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_owned).collect())
    }
}

/// Succeeds when `granted` holds the wildcard or every required scope.
///
/// Matching is exact and case-sensitive. Only the first missing scope is reported.
pub fn authorize(required: &ScopeSet, granted: &ScopeSet) -> Result<(), MissingScope> {
    if granted.contains(WILDCARD_SCOPE) {
        return Ok(());
    }

    match required.iter().find(|scope| !granted.contains(scope)) {
        Some(scope) => Err(MissingScope {
            scope: scope.to_owned(),
        }),
        None => Ok(()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
