//! Error types for graph snapshots and configuration.

use thiserror::Error;

/// Result type alias for graph and configuration operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while building or loading a graph snapshot or a config.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node name: {0}")]
    DuplicateName(String),

    #[error("node {node} references unknown input {input}")]
    UnknownInput { node: String, input: String },

    #[error("node {node} references input {input} which is not created before it")]
    ForwardReference { node: String, input: String },

    #[error("graph is full: node {node} does not fit in a u32 node id")]
    TooManyNodes { node: String },

    #[error("unknown operation kind: {0}")]
    UnknownOpKind(String),

    #[error("invalid rule {rule}: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("invalid avoid entry {entry:?}: {reason}")]
    InvalidAvoidEntry { entry: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
