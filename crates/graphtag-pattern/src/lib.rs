//! graphtag-pattern — declarative subgraph patterns and matching.
//!
//! Patterns are plain values: a set of typed slots, the edges between them,
//! and per-slot predicates. The matcher walks a [`Graph`] snapshot and yields
//! every place a pattern occurs without touching the graph.
//!
//! # Components
//!
//! - **`filter`** — node filters (kind constraints, attribute predicates)
//! - **`descriptor`** — `Pattern`, `PatternBuilder`, construction-time validation
//! - **`matcher`** — anchor-first backward matching (`find_matches`)
//! - **`library`** — built-in patterns (`rms_norm`, `embedding_gather`, `single_op`)
//!
//! [`Graph`]: graphtag_core::Graph

pub mod descriptor;
pub mod error;
pub mod filter;
pub mod library;
pub mod matcher;

pub use descriptor::{InputSpec, Pattern, PatternBuilder, Slot, SlotId};
pub use error::{PatternError, PatternResult};
pub use filter::{AttrPredicate, KindConstraint, NodeFilter};
pub use library::EmbeddingShape;
pub use matcher::{Match, Matches, find_matches, match_at};
