//! Property tests for the matcher over random DAGs.

use std::collections::HashSet;

use graphtag_core::{Graph, GraphBuilder, OpKind};
use graphtag_pattern::library::rms_norm;
use graphtag_pattern::{InputSpec, Match, NodeFilter, Pattern, PatternBuilder, find_matches};
use proptest::prelude::*;

const KINDS: [OpKind; 7] = [
    OpKind::Parameter,
    OpKind::Constant,
    OpKind::Power,
    OpKind::ReduceMean,
    OpKind::Add,
    OpKind::Sqrt,
    OpKind::Multiply,
];

fn arity(kind: OpKind) -> usize {
    match kind {
        OpKind::Parameter | OpKind::Constant => 0,
        OpKind::Sqrt => 1,
        _ => 2,
    }
}

/// Node `i` picks its kind from `KINDS` and its inputs among nodes `0..i`.
fn build_graph(recipe: &[(usize, usize, usize)]) -> Graph {
    let mut b = GraphBuilder::new();
    for (i, &(kind, a, c)) in recipe.iter().enumerate() {
        let kind = if i < 2 { KINDS[i] } else { KINDS[kind % KINDS.len()] };
        let inputs: Vec<_> = [a, c]
            .iter()
            .take(arity(kind))
            .map(|pick| graphtag_core::NodeId((pick % i) as u32))
            .collect();
        b.add(format!("n{i}"), kind, &inputs).unwrap();
    }
    b.build()
}

fn graph_strategy() -> impl Strategy<Value = Graph> {
    prop::collection::vec((0..KINDS.len(), 0..64usize, 0..64usize), 2..80)
        .prop_map(|recipe| build_graph(&recipe))
}

fn commutative_pattern() -> Pattern {
    let mut p = PatternBuilder::new("sqrt_plus_const");
    let sqrt = p.op("sqrt", OpKind::Sqrt, &[InputSpec::any()]);
    let add = p.op("add", OpKind::Add, &[sqrt.into(), InputSpec::kind(OpKind::Constant)]);
    p.commutative(add);
    p.build(add).unwrap()
}

fn square_pattern() -> Pattern {
    let mut p = PatternBuilder::new("square");
    let x = p.leaf("x", NodeFilter::any());
    let mul = p.op("mul", OpKind::Multiply, &[x.into(), x.into()]);
    p.build(mul).unwrap()
}

fn assert_consistent(graph: &Graph, pattern: &Pattern, m: &Match) {
    // Every slot filter holds and every slot has its own node.
    let distinct: HashSet<_> = m.nodes().iter().collect();
    assert_eq!(distinct.len(), pattern.len());
    for (slot, spec) in pattern.slots() {
        assert!(spec.filter().matches(graph.node(m.node(slot)).unwrap()));
    }
    // Every declared edge is realized by the identical producer.
    for (producer, consumer, index) in pattern.edges() {
        let consumer_node = graph.node(m.node(consumer)).unwrap();
        let actual = consumer_node.inputs[m.input_index(consumer, index)];
        assert_eq!(actual, m.node(producer));
    }
}

proptest! {
    #[test]
    fn matching_is_deterministic(graph in graph_strategy()) {
        for pattern in [rms_norm(), commutative_pattern(), square_pattern()] {
            let first: Vec<Match> = find_matches(&graph, &pattern).collect();
            let second: Vec<Match> = find_matches(&graph, &pattern).collect();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn bindings_respect_declared_edges(graph in graph_strategy()) {
        for pattern in [rms_norm(), commutative_pattern(), square_pattern()] {
            for m in find_matches(&graph, &pattern) {
                assert_consistent(&graph, &pattern, &m);
            }
        }
    }

    #[test]
    fn at_most_one_match_per_anchor(graph in graph_strategy()) {
        let pattern = rms_norm();
        let roots: Vec<_> = find_matches(&graph, &pattern).map(|m| m.root(&pattern)).collect();
        let unique: HashSet<_> = roots.iter().collect();
        prop_assert_eq!(unique.len(), roots.len());
        // Roots come out in creation order.
        prop_assert!(roots.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn planted_rms_norm_is_found_in_a_larger_graph() {
    let mut b = GraphBuilder::new();
    let x = b.parameter("x", &[1, 8]).unwrap();
    let w = b.parameter("w", &[8, 8]).unwrap();
    let mm = b.add("mm", OpKind::MatMul, &[x, w]).unwrap();
    let two = b.constant("two", 2.0).unwrap();
    let pow = b.add("pow", OpKind::Power, &[mm, two]).unwrap();
    let axes = b.constant("axes", -1.0).unwrap();
    let mean = b.add("mean", OpKind::ReduceMean, &[pow, axes]).unwrap();
    let eps = b.constant("eps", 1e-5).unwrap();
    let add = b.add("add", OpKind::Add, &[mean, eps]).unwrap();
    let sqrt = b.add("sqrt", OpKind::Sqrt, &[add]).unwrap();
    let div = b.add("div", OpKind::Divide, &[mm, sqrt]).unwrap();
    b.add("out", OpKind::Result, &[div]).unwrap();
    let graph = b.build();
    let pattern = rms_norm();

    let matches: Vec<Match> = find_matches(&graph, &pattern).collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].nodes(), &[pow, mean, add, sqrt]);
    assert_consistent(&graph, &pattern, &matches[0]);
}
