//! Final tags do not depend on rule order.

use graphtag_avoid::{AvoidRule, RuleSet, Snapshot};
use graphtag_core::{Graph, GraphBuilder, NodeId, OpKind};
use graphtag_pattern::{InputSpec, Pattern, PatternBuilder, library};
use proptest::prelude::*;

const KINDS: [OpKind; 8] = [
    OpKind::Parameter,
    OpKind::Constant,
    OpKind::Power,
    OpKind::ReduceMean,
    OpKind::Add,
    OpKind::Sqrt,
    OpKind::Multiply,
    OpKind::MatMul,
];

fn arity(kind: OpKind) -> usize {
    match kind {
        OpKind::Parameter | OpKind::Constant => 0,
        OpKind::Sqrt => 1,
        _ => 2,
    }
}

/// Node `i` picks its kind from `KINDS` and its inputs among nodes `0..i`.
/// The first two nodes are always leaves.
fn build_graph(recipe: &[(usize, usize, usize)]) -> Graph {
    let mut b = GraphBuilder::new();
    for (i, &(kind, a, c)) in recipe.iter().enumerate() {
        let kind = if i < 2 { KINDS[i] } else { KINDS[kind % KINDS.len()] };
        let inputs: Vec<NodeId> = [a, c]
            .iter()
            .take(arity(kind))
            .map(|pick| NodeId((pick % i) as u32))
            .collect();
        b.add(format!("n{i}"), kind, &inputs).unwrap();
    }
    b.build()
}

fn scaled_sqrt() -> Pattern {
    let mut p = PatternBuilder::new("scaled_sqrt");
    let mul = p.op(
        "mul",
        OpKind::Multiply,
        &[InputSpec::any(), InputSpec::kind(OpKind::Constant)],
    );
    p.commutative(mul);
    let sqrt = p.op("sqrt", OpKind::Sqrt, &[mul.into()]);
    p.build(sqrt).unwrap()
}

fn rules(snapshot: &Snapshot) -> Vec<AvoidRule<'_>> {
    vec![
        AvoidRule::new("rms-npu", library::rms_norm(), "NPU", snapshot),
        AvoidRule::new("sqrt-npu", library::single_op(OpKind::Sqrt), "NPU", snapshot),
        AvoidRule::new("add-gpu", library::single_op(OpKind::Add), "GPU", snapshot),
        AvoidRule::new("matmul-gpu", library::single_op(OpKind::MatMul), "GPU", snapshot),
        AvoidRule::new("scaled-cpu", scaled_sqrt(), "CPU", snapshot),
        AvoidRule::new("rms-gpu", library::rms_norm(), "GPU", snapshot),
    ]
}

fn run_in_order(graph: &Graph, order: &[usize], merges: &[(usize, usize)]) -> Snapshot {
    let mut snapshot = Snapshot::from_graph(graph);
    for &(a, b) in merges {
        let n = graph.len();
        snapshot
            .merge(NodeId((a % n) as u32), NodeId((b % n) as u32))
            .unwrap();
    }
    {
        let mut all: Vec<Option<AvoidRule<'_>>> = rules(&snapshot).into_iter().map(Some).collect();
        let mut set = RuleSet::default();
        for &i in order {
            set.push(all[i].take().unwrap());
        }
        set.run(graph).unwrap();
    }
    snapshot
}

fn recipe() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    prop::collection::vec((0usize..64, 0usize..64, 0usize..64), 2..40)
}

proptest! {
    #[test]
    fn any_rule_order_gives_identical_tags(
        recipe in recipe(),
        order in Just((0..6).collect::<Vec<usize>>()).prop_shuffle(),
        merges in prop::collection::vec((0usize..64, 0usize..64), 0..4),
    ) {
        let graph = build_graph(&recipe);
        let identity: Vec<usize> = (0..6).collect();

        let baseline = run_in_order(&graph, &identity, &merges);
        let shuffled = run_in_order(&graph, &order, &merges);

        prop_assert_eq!(baseline.avoided_by_node(), shuffled.avoided_by_node());
    }

    #[test]
    fn applying_twice_equals_applying_once(recipe in recipe()) {
        let graph = build_graph(&recipe);
        let identity: Vec<usize> = (0..6).collect();
        let once = run_in_order(&graph, &identity, &[]);

        let twice = Snapshot::from_graph(&graph);
        let set = RuleSet::default().with_rules(rules(&twice));
        set.run(&graph).unwrap();
        set.run(&graph).unwrap();

        prop_assert_eq!(once.avoided_by_node(), twice.avoided_by_node());
    }
}
