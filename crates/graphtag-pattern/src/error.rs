//! Pattern error types.

use thiserror::Error;

/// Result type alias for pattern construction.
pub type PatternResult<T> = Result<T, PatternError>;

/// Errors raised while constructing a pattern descriptor.
///
/// Matching itself never fails: a node that does not fit the pattern is
/// simply not reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("malformed pattern {pattern}: {reason}")]
    Malformed { pattern: String, reason: String },
}

impl PatternError {
    pub(crate) fn malformed(pattern: &str, reason: impl Into<String>) -> Self {
        PatternError::Malformed {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
