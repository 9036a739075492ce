//! Rule-set runner.
//!
//! Applies each rule exactly once, in listed order, over one graph snapshot.
//! Tags are a monotonic union per group, so the final assignment does not
//! depend on the order; the order only decides which failure is reported
//! first under [`ErrorPolicy::Abort`].

use graphtag_core::Graph;
use tracing::{info, warn};

use crate::error::{AvoidError, AvoidResult};
use crate::pass::GraphPass;
use crate::rule::{AvoidRule, RuleReport};

pub use graphtag_core::OnError as ErrorPolicy;

/// Result of a rule-set run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Reports of the rules that completed, in run order.
    pub rules: Vec<RuleReport>,
    /// Failures skipped under [`ErrorPolicy::Continue`].
    pub failures: Vec<AvoidError>,
}

impl RunReport {
    pub fn total_matches(&self) -> usize {
        self.rules.iter().map(|r| r.matches).sum()
    }

    pub fn newly_avoided(&self) -> usize {
        self.rules.iter().map(|r| r.newly_avoided).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RuleSet<'r> {
    rules: Vec<AvoidRule<'r>>,
    policy: ErrorPolicy,
}

impl<'r> RuleSet<'r> {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            rules: Vec::new(),
            policy,
        }
    }

    pub fn push(&mut self, rule: AvoidRule<'r>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = AvoidRule<'r>>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn rules(&self) -> &[AvoidRule<'r>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn run(&self, graph: &Graph) -> AvoidResult<RunReport> {
        let mut report = RunReport::default();

        for rule in &self.rules {
            match rule.apply(graph) {
                Ok(rule_report) => report.rules.push(rule_report),
                Err(e) => match self.policy {
                    ErrorPolicy::Abort => return Err(e),
                    ErrorPolicy::Continue => {
                        warn!(rule = %rule.name(), error = %e, "avoid rule failed, continuing");
                        report.failures.push(e);
                    }
                },
            }
        }

        info!(
            rules = self.rules.len(),
            matches = report.total_matches(),
            newly_avoided = report.newly_avoided(),
            failures = report.failures.len(),
            "avoid pass complete"
        );
        Ok(report)
    }
}

impl GraphPass for RuleSet<'_> {
    fn name(&self) -> &str {
        "avoid"
    }

    fn run_on_graph(&self, graph: &Graph) -> AvoidResult<bool> {
        self.run(graph)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{GroupId, GroupRegistry, Snapshot};
    use graphtag_core::{GraphBuilder, OpKind};
    use graphtag_pattern::library;

    fn graph() -> Graph {
        let mut b = GraphBuilder::new();
        let x = b.parameter("x", &[4]).unwrap();
        let s = b.add("sqrt", OpKind::Sqrt, &[x]).unwrap();
        let y = b.parameter("y", &[4]).unwrap();
        let m = b.add("mm", OpKind::MatMul, &[s, y]).unwrap();
        b.add("out", OpKind::Result, &[m]).unwrap();
        b.build()
    }

    // Registry that knows every node except `mm`.
    fn partial_registry(graph: &Graph) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for node in graph.nodes().iter().filter(|n| n.name != "mm") {
            snapshot.register(node.id, GroupId(node.id.0)).unwrap();
        }
        snapshot
    }

    #[test]
    fn runs_rules_in_order() {
        let g = graph();
        let snapshot = Snapshot::from_graph(&g);
        let set = RuleSet::new(ErrorPolicy::Abort).with_rules([
            AvoidRule::new("sqrt", library::single_op(OpKind::Sqrt), "NPU", &snapshot),
            AvoidRule::new("mm", library::single_op(OpKind::MatMul), "GPU", &snapshot),
        ]);

        let report = set.run(&g).unwrap();

        let names: Vec<&str> = report.rules.iter().map(|r| r.rule.as_str()).collect();
        assert_eq!(names, vec!["sqrt", "mm"]);
        assert_eq!(report.total_matches(), 2);
        assert!(report.is_clean());
        assert!(snapshot.group_of(g.id_of("mm").unwrap()).unwrap().avoids("GPU"));
    }

    #[test]
    fn abort_stops_at_first_failure() {
        let g = graph();
        let snapshot = partial_registry(&g);
        let mut set = RuleSet::new(ErrorPolicy::Abort);
        set.push(AvoidRule::new("mm", library::single_op(OpKind::MatMul), "NPU", &snapshot))
            .push(AvoidRule::new("sqrt", library::single_op(OpKind::Sqrt), "NPU", &snapshot));

        let err = set.run(&g).unwrap_err();

        assert!(matches!(err, AvoidError::UnknownNode { ref rule, .. } if rule == "mm"));
        // The second rule never ran.
        assert!(!snapshot.group_of(g.id_of("sqrt").unwrap()).unwrap().avoids("NPU"));
    }

    #[test]
    fn continue_records_failure_and_runs_the_rest() {
        let g = graph();
        let snapshot = partial_registry(&g);
        let set = RuleSet::new(ErrorPolicy::Continue).with_rules([
            AvoidRule::new("mm", library::single_op(OpKind::MatMul), "NPU", &snapshot),
            AvoidRule::new("sqrt", library::single_op(OpKind::Sqrt), "NPU", &snapshot),
        ]);

        let report = set.run(&g).unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.rules.len(), 1);
        assert_eq!(report.rules[0].rule, "sqrt");
        assert!(snapshot.group_of(g.id_of("sqrt").unwrap()).unwrap().avoids("NPU"));
    }

    #[test]
    fn empty_set_is_a_clean_no_op() {
        let set = RuleSet::default();
        assert!(set.is_empty());
        assert_eq!(set.policy(), ErrorPolicy::Abort);

        let report = set.run(&graph()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.total_matches(), 0);
        assert!(!set.run_on_graph(&graph()).unwrap());
    }
}
