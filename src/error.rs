//! Error types for the reflow pipeline
//!
//! Every stage reports failure through [`FormatError`] rather than a boxed or stringly-typed
//! error, matching the hand-rolled error enum convention used throughout this codebase.

use std::fmt;

/// Errors that can occur while formatting a source text.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// The tokenizer adapter (stage A) rejected the input: an unterminated string or
    /// bracket, an inconsistent dedent, or an encoding/decoding failure.
    InvalidSource {
        reason: String,
        line: Option<usize>,
    },

    /// An opening bracket or INDENT has no matching closer (stage C).
    UnbalancedScope { opener: String, line: i64 },

    /// Re-tokenizing the emitted text disagreed with the input under the comparison
    /// filter of the emitter/validator (stage G).
    ValidationFailed { detail: String },

    /// Two or more mutually exclusive [`crate::config::FormatOptions`] were requested at once.
    ConflictingOptions { detail: String },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::InvalidSource { reason, line: Some(l) } => {
                write!(f, "invalid source at line {l}: {reason}")
            }
            FormatError::InvalidSource { reason, line: None } => {
                write!(f, "invalid source: {reason}")
            }
            FormatError::UnbalancedScope { opener, line } => {
                write!(f, "unbalanced scope: '{opener}' opened at line {line} has no matching closer")
            }
            FormatError::ValidationFailed { detail } => {
                write!(f, "validation failed: {detail}")
            }
            FormatError::ConflictingOptions { detail } => {
                write!(f, "conflicting options: {detail}")
            }
        }
    }
}

impl std::error::Error for FormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_invalid_source_with_line() {
        let err = FormatError::InvalidSource {
            reason: "unterminated string".to_string(),
            line: Some(3),
        };
        assert_eq!(err.to_string(), "invalid source at line 3: unterminated string");
    }

    #[test]
    fn displays_unbalanced_scope() {
        let err = FormatError::UnbalancedScope {
            opener: "(".to_string(),
            line: 1,
        };
        assert!(err.to_string().contains("'(' opened at line 1"));
    }
}
