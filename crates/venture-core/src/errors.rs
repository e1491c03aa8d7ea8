//! Structured error types shared across venture crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`VentureError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (operator names, node ids, arities, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
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
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for the venture trace engine.
///
/// Variants correspond one-for-one to the error kinds in the design's error
/// handling section: type/arity/domain errors at SP boundaries are recovered
/// at the directive boundary; `Invariant` violations are internal bugs that
/// the caller should treat as fatal (the type itself does not panic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum VentureError {
    /// Operand of the wrong kind was passed to an SP.
    #[error("type error: {0}")]
    Type(ErrorInfo),
    /// Wrong number of operands was passed to an SP.
    #[error("arity error: {0}")]
    Arity(ErrorInfo),
    /// An SP's precondition on its own argument values was violated
    /// (Bernoulli parameter outside `[0, 1]`, division by zero, ...).
    #[error("domain error: {0}")]
    Domain(ErrorInfo),
    /// A structural invariant of the trace/scaffold was violated. Internal
    /// bug; never raised in response to host input.
    #[error("invariant violation: {0}")]
    Invariant(ErrorInfo),
    /// Randomness/seeding failure.
    #[error("rng error: {0}")]
    Rng(ErrorInfo),
    /// Serialization, checkpoint or manifest failure.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl VentureError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            VentureError::Type(info)
            | VentureError::Arity(info)
            | VentureError::Domain(info)
            | VentureError::Invariant(info)
            | VentureError::Rng(info)
            | VentureError::Serde(info) => info,
        }
    }

    /// Shorthand for constructing a [`VentureError::Type`].
    pub fn type_error(
        operator: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        VentureError::Type(
            ErrorInfo::new("wrong-type", "operand had the wrong kind")
                .with_context("operator", operator.into())
                .with_context("expected", expected.into())
                .with_context("got", got.into()),
        )
    }

    /// Shorthand for constructing a [`VentureError::Arity`].
    pub fn arity_error(operator: impl Into<String>, expected: usize, got: usize) -> Self {
        VentureError::Arity(
            ErrorInfo::new("wrong-arity", "operator received the wrong number of operands")
                .with_context("operator", operator.into())
                .with_context("expected", expected)
                .with_context("got", got),
        )
    }

    /// Shorthand for constructing a [`VentureError::Domain`].
    pub fn domain_error(operator: impl Into<String>, message: impl Into<String>) -> Self {
        VentureError::Domain(
            ErrorInfo::new("domain-violation", message).with_context("operator", operator.into()),
        )
    }

    /// Shorthand for constructing a [`VentureError::Invariant`].
    pub fn invariant(code: impl Into<String>, message: impl Into<String>) -> Self {
        VentureError::Invariant(ErrorInfo::new(code, message))
    }
}
