//! graphtag-avoid — placement-avoidance rules over computation graphs.
//!
//! Each rule pairs a pattern with a device. Every node of every match gets
//! its group tagged "avoid <device>"; the downstream partitioner reads the
//! tags when it assigns groups to devices. Rules never rewrite the graph and
//! tags only accumulate, so a rule set gives the same result in any order.
//!
//! # Components
//!
//! - **`registry`** — node → group lookup (`GroupRegistry`, `Snapshot`)
//! - **`rule`** — `AvoidRule`, one pattern and one forbidden device
//! - **`runner`** — `RuleSet`, applies rules once each and reports
//! - **`pass`** — `GraphPass`, the "did the graph change" contract
//! - **`convert`** — builds a `RuleSet` from an `AvoidConfig`

pub mod convert;
pub mod error;
pub mod pass;
pub mod registry;
pub mod rule;
pub mod runner;

pub use convert::{resolve_pattern, rule_set_from_config};
pub use error::{AvoidError, AvoidResult};
pub use pass::GraphPass;
pub use registry::{Group, GroupHandle, GroupId, GroupIdInUse, GroupRegistry, Snapshot, UnknownNode};
pub use rule::{AvoidRule, RuleReport};
pub use runner::{RuleSet, RunReport};
