//! Structured error types shared across the EMS crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`EmsError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Canonical error type for the EMS engine.
///
/// Domain outcomes (rejected swaps) are never errors; they are recorded in the
/// per-swap trace. Every variant here aborts the batch, since any output
/// produced past a violated invariant would be silently incorrect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum EmsError {
    /// Malformed input: invalid slot references, bad descriptor shapes.
    #[error("input error: {0}")]
    Input(ErrorInfo),
    /// Structural invariant violation: broken dependency chain, unanswerable
    /// existence query, contradictory facts.
    #[error("structure error: {0}")]
    Structure(ErrorInfo),
    /// External sorting or spill storage failure.
    #[error("sort error: {0}")]
    Sort(ErrorInfo),
}

impl EmsError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            EmsError::Input(info) | EmsError::Structure(info) | EmsError::Sort(info) => info,
        }
    }
}
