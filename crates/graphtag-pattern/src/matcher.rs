//! Anchor-first backward matcher.
//!
//! For every node (in creation order) that satisfies the root slot's filter,
//! the matcher binds the root and walks the node's actual inputs toward the
//! pattern leaves, checking each declared input against the producer at the
//! same input index. The first mismatch abandons the anchor. Each attempt
//! only inspects a pattern-sized neighbourhood of the anchor, so a full search
//! costs O(|V|·k) for a pattern of k slots.
//!
//! Commutative slots try the declared input order first and the swapped
//! order second; the first complete binding wins, so an anchor produces at
//! most one match and the search order is fully deterministic.

use std::iter::FusedIterator;

use graphtag_core::{Graph, NodeId};
use tracing::trace;

use crate::descriptor::{InputSpec, Pattern, SlotId};

/// One occurrence of a pattern: a node for every slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    bindings: Vec<NodeId>,
    swapped: Vec<bool>,
}

impl Match {
    /// Node bound to `slot`.
    ///
    /// # Panics
    ///
    /// If `slot` does not belong to the pattern this match came from.
    pub fn node(&self, slot: SlotId) -> NodeId {
        self.bindings[slot.0]
    }

    pub fn get(&self, slot: SlotId) -> Option<NodeId> {
        self.bindings.get(slot.0).copied()
    }

    pub fn node_by_name(&self, pattern: &Pattern, name: &str) -> Option<NodeId> {
        pattern.slot_by_name(name).and_then(|slot| self.get(slot))
    }

    pub fn root(&self, pattern: &Pattern) -> NodeId {
        self.node(pattern.root())
    }

    /// Bound nodes in slot declaration order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether the inputs of a commutative slot were matched swapped.
    pub fn is_swapped(&self, slot: SlotId) -> bool {
        self.swapped.get(slot.0).copied().unwrap_or(false)
    }

    /// Graph input index that realizes declared input `declared` of `slot`.
    pub fn input_index(&self, slot: SlotId, declared: usize) -> usize {
        if self.is_swapped(slot) { 1 - declared } else { declared }
    }
}

/// Lazily search `graph` for `pattern`.
///
/// The returned iterator borrows both and can be recreated (or cloned before
/// it is advanced) to replay the exact same sequence.
pub fn find_matches<'g, 'p>(graph: &'g Graph, pattern: &'p Pattern) -> Matches<'g, 'p> {
    Matches {
        graph,
        pattern,
        next: 0,
    }
}

/// Iterator over the matches of one pattern in one graph.
#[derive(Debug, Clone)]
pub struct Matches<'g, 'p> {
    graph: &'g Graph,
    pattern: &'p Pattern,
    next: usize,
}

impl Iterator for Matches<'_, '_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        let root_filter = self.pattern.root_slot().filter();
        while let Some(node) = self.graph.nodes().get(self.next) {
            self.next += 1;
            if !root_filter.matches(node) {
                continue;
            }
            trace!(pattern = self.pattern.name(), anchor = %node.name, "trying anchor");
            if let Some(found) = match_at(self.graph, self.pattern, node.id) {
                trace!(pattern = self.pattern.name(), anchor = %node.name, "pattern matched");
                return Some(found);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.graph.len().saturating_sub(self.next)))
    }
}

impl FusedIterator for Matches<'_, '_> {}

/// Try to match `pattern` with its root bound to `anchor`.
pub fn match_at(graph: &Graph, pattern: &Pattern, anchor: NodeId) -> Option<Match> {
    let start = Binding {
        slots: vec![None; pattern.len()],
        swapped: vec![false; pattern.len()],
    };
    let binding = bind(graph, pattern, pattern.root(), anchor, start)
        .into_iter()
        .next()?;

    let bindings = binding.slots.into_iter().collect::<Option<Vec<_>>>()?;
    Some(Match {
        bindings,
        swapped: binding.swapped,
    })
}

/// Partial slot assignment grown from the anchor.
#[derive(Debug, Clone)]
struct Binding {
    slots: Vec<Option<NodeId>>,
    swapped: Vec<bool>,
}

impl Binding {
    fn holds(&self, node: NodeId) -> bool {
        self.slots.contains(&Some(node))
    }
}

/// Every consistent extension of `binding` with `slot` bound to `node`,
/// in preference order. Empty when the node does not fit.
fn bind(graph: &Graph, pattern: &Pattern, slot: SlotId, node: NodeId, mut binding: Binding) -> Vec<Binding> {
    if let Some(bound) = binding.slots[slot.0] {
        return if bound == node { vec![binding] } else { Vec::new() };
    }
    if binding.holds(node) {
        return Vec::new();
    }

    let Some(graph_node) = graph.node(node) else {
        return Vec::new();
    };
    let spec = pattern.slot(slot);
    if !spec.filter().matches(graph_node) {
        return Vec::new();
    }
    let declared = spec.inputs();
    if !declared.is_empty() && graph_node.arity() != declared.len() {
        return Vec::new();
    }

    binding.slots[slot.0] = Some(node);

    let mut results = bind_inputs(graph, pattern, declared, &graph_node.inputs, binding.clone());
    if spec.is_commutative() {
        let swapped_inputs = [graph_node.inputs[1], graph_node.inputs[0]];
        binding.swapped[slot.0] = true;
        results.extend(bind_inputs(graph, pattern, declared, &swapped_inputs, binding));
    }
    results
}

fn bind_inputs(
    graph: &Graph,
    pattern: &Pattern,
    declared: &[InputSpec],
    actual: &[NodeId],
    binding: Binding,
) -> Vec<Binding> {
    let mut frontier = vec![binding];
    for (spec, &producer) in declared.iter().zip(actual) {
        frontier = match spec {
            InputSpec::Slot(input_slot) => frontier
                .into_iter()
                .flat_map(|b| bind(graph, pattern, *input_slot, producer, b))
                .collect(),
            InputSpec::Guard(filter) => {
                let fits = graph.node(producer).is_some_and(|n| filter.matches(n));
                if fits { frontier } else { Vec::new() }
            }
        };
        if frontier.is_empty() {
            break;
        }
    }
    frontier
}
