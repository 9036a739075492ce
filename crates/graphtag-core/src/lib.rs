//! graphtag-core — shared types for the graphtag workspace.
//!
//! Holds the read-only computation-graph snapshot that patterns are matched
//! against, and the TOML-facing configuration that describes which avoid
//! rules to run.
//!
//! # Components
//!
//! - **`types`** — node identity, operation kinds, node metadata
//! - **`graph`** — immutable graph snapshot, builder, JSON loading
//! - **`config`** — avoid-rule configuration (`AvoidConfig`)
//! - **`error`** — `GraphError` and the `GraphResult` alias

pub mod config;
pub mod error;
pub mod graph;
pub mod types;

pub use config::{
    AvoidConfig, AvoidEntry, FilterConfig, InputConfig, OnError, PatternConfig, PatternParams,
    RuleConfig, RuleTarget, SlotConfig,
};
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, GraphBuilder, GraphSpec, NodeSpec};
pub use types::*;
