//! Avoid rule: one pattern, one forbidden device.

use graphtag_core::{Graph, NodeId};
use graphtag_pattern::{Match, Pattern, find_matches};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AvoidError, AvoidResult};
use crate::pass::GraphPass;
use crate::registry::{GroupHandle, GroupRegistry};

/// Outcome of one rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule: String,
    pub pattern: String,
    pub device: String,
    /// Matches processed.
    pub matches: usize,
    /// Bound nodes visited across all matches, counting shared nodes again.
    pub nodes_tagged: usize,
    /// Groups that did not carry the tag before this application.
    pub newly_avoided: usize,
}

/// Tags every group touched by a match of `pattern` with "avoid `device`".
pub struct AvoidRule<'r> {
    name: String,
    pattern: Pattern,
    device: String,
    registry: &'r dyn GroupRegistry,
}

impl<'r> AvoidRule<'r> {
    pub fn new(
        name: impl Into<String>,
        pattern: Pattern,
        device: impl Into<String>,
        registry: &'r dyn GroupRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            pattern,
            device: device.into(),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Match the pattern over `graph` and tag the groups of every bound node.
    ///
    /// Every node of a match, not only its root, is tagged. A match whose
    /// nodes cannot all be resolved to groups fails the rule without tagging
    /// any of them; matches processed before it keep their tags.
    pub fn apply(&self, graph: &Graph) -> AvoidResult<RuleReport> {
        let mut report = RuleReport {
            rule: self.name.clone(),
            pattern: self.pattern.name().to_string(),
            device: self.device.clone(),
            matches: 0,
            nodes_tagged: 0,
            newly_avoided: 0,
        };

        for m in find_matches(graph, &self.pattern) {
            let groups = self.resolve(graph, &m)?;
            let mut fresh = 0;
            for group in &groups {
                if group.avoid(&self.device) {
                    fresh += 1;
                }
            }
            debug!(
                rule = %self.name,
                root = %graph.display_name(m.root(&self.pattern)),
                nodes = groups.len(),
                newly_avoided = fresh,
                "tagged match"
            );
            report.matches += 1;
            report.nodes_tagged += groups.len();
            report.newly_avoided += fresh;
        }

        info!(
            rule = %self.name,
            pattern = %report.pattern,
            device = %self.device,
            matches = report.matches,
            newly_avoided = report.newly_avoided,
            "avoid rule applied"
        );
        Ok(report)
    }

    fn resolve(&self, graph: &Graph, m: &Match) -> AvoidResult<Vec<GroupHandle>> {
        m.nodes()
            .iter()
            .map(|&node| {
                self.registry
                    .group_of(node)
                    .map_err(|_| self.unknown_node(graph, node))
            })
            .collect()
    }

    fn unknown_node(&self, graph: &Graph, node: NodeId) -> AvoidError {
        AvoidError::UnknownNode {
            rule: self.name.clone(),
            pattern: self.pattern.name().to_string(),
            node,
            node_name: graph.display_name(node),
        }
    }
}

impl std::fmt::Debug for AvoidRule<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvoidRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.name())
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl GraphPass for AvoidRule<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_on_graph(&self, graph: &Graph) -> AvoidResult<bool> {
        self.apply(graph)?;
        Ok(false)
    }
}
