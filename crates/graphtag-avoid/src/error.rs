//! Avoid-rule error types.

use graphtag_core::{GraphError, NodeId};
use graphtag_pattern::PatternError;
use thiserror::Error;

/// Result type alias for avoid-rule operations.
pub type AvoidResult<T> = Result<T, AvoidError>;

/// Errors that can occur while building or applying avoid rules.
#[derive(Debug, Error)]
pub enum AvoidError {
    /// A matched node has no group. The registry was built from a different
    /// graph snapshot than the one being matched.
    #[error("rule {rule} (pattern {pattern}): node {node_name} ({node}) has no registered group")]
    UnknownNode {
        rule: String,
        pattern: String,
        node: NodeId,
        node_name: String,
    },

    #[error("unknown pattern: {0}")]
    UnknownPattern(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("config error: {0}")]
    Config(#[from] GraphError),
}
