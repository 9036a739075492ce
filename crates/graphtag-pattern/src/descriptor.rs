//! Pattern descriptors.
//!
//! A [`Pattern`] is a small DAG of [`Slot`]s with one designated root, the
//! anchor the matcher starts from (usually the last operation of the shape).
//! Each slot lists its inputs in input-index order; an input is either another
//! slot (a pattern edge, the producer gets bound) or a guard (the producer is
//! checked but not bound, `any_input` being the guard that accepts anything).
//!
//! ```text
//!   power(*, *) ──► reduce(power, const) ──► add(reduce, *) ──► sqrt(add)
//! ```
//!
//! Descriptors are validated once at construction and immutable afterwards.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use graphtag_core::{InputConfig, OpKind, PatternConfig};

use crate::error::{PatternError, PatternResult};
use crate::filter::{KindConstraint, NodeFilter};

/// Index of a slot within its pattern, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// One declared input of a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSpec {
    /// Pattern edge: the producer is bound to this slot.
    Slot(SlotId),
    /// The producer must satisfy the filter but is not part of the match.
    Guard(NodeFilter),
}

impl InputSpec {
    pub fn any() -> Self {
        InputSpec::Guard(NodeFilter::any())
    }

    pub fn kind(kind: OpKind) -> Self {
        InputSpec::Guard(NodeFilter::kind(kind))
    }

    pub fn guard(filter: NodeFilter) -> Self {
        InputSpec::Guard(filter)
    }
}

impl From<SlotId> for InputSpec {
    fn from(slot: SlotId) -> Self {
        InputSpec::Slot(slot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    name: String,
    filter: NodeFilter,
    inputs: Vec<InputSpec>,
    commutative: bool,
}

impl Slot {
    pub fn new(name: impl Into<String>, filter: NodeFilter, inputs: Vec<InputSpec>) -> Self {
        Self {
            name: name.into(),
            filter,
            inputs,
            commutative: false,
        }
    }

    pub fn commutative(mut self) -> Self {
        self.commutative = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &NodeFilter {
        &self.filter
    }

    /// Declared inputs in input-index order. Empty means the node's arity is
    /// not constrained; otherwise the node must have exactly this many inputs.
    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Whether the two inputs may be matched in either order.
    pub fn is_commutative(&self) -> bool {
        self.commutative
    }
}

/// Immutable, validated subgraph pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    name: String,
    slots: Vec<Slot>,
    root: SlotId,
    topo: Vec<SlotId>,
}

impl Pattern {
    /// Validate and assemble a pattern.
    ///
    /// Rejects: no slots, a root out of range, duplicate slot names, edges to
    /// unknown slots, commutative slots without exactly two inputs or whose
    /// kind constraint admits a non-commutative op, cycles,
    /// and slots the root cannot reach through its inputs.
    pub fn new(name: impl Into<String>, slots: Vec<Slot>, root: SlotId) -> PatternResult<Self> {
        let name = name.into();
        let malformed = |reason: String| PatternError::malformed(&name, reason);

        if slots.is_empty() {
            return Err(malformed("pattern has no slots".to_string()));
        }
        if root.0 >= slots.len() {
            return Err(malformed(format!("root {root} is out of range")));
        }

        let mut seen = HashMap::new();
        for (i, slot) in slots.iter().enumerate() {
            if let Some(first) = seen.insert(slot.name.as_str(), i) {
                return Err(malformed(format!(
                    "slot name {:?} is used by {} and {}",
                    slot.name,
                    SlotId(first),
                    SlotId(i)
                )));
            }
            for input in &slot.inputs {
                if let InputSpec::Slot(producer) = input {
                    if producer.0 >= slots.len() {
                        return Err(malformed(format!(
                            "slot {:?} references unknown slot {producer}",
                            slot.name
                        )));
                    }
                }
            }
            if slot.commutative && slot.inputs.len() != 2 {
                return Err(malformed(format!(
                    "commutative slot {:?} must declare exactly two inputs",
                    slot.name
                )));
            }
            let swaps_unsafely = if slot.commutative {
                non_commutative_kind(&slot.filter.kind)
            } else {
                None
            };
            if let Some(kind) = swaps_unsafely {
                return Err(malformed(format!(
                    "commutative slot {:?} admits non-commutative op {kind}",
                    slot.name
                )));
            }
        }

        let topo = topological_order(&slots).map_err(|stuck| {
            malformed(format!("slot {:?} is part of a cycle", slots[stuck.0].name))
        })?;

        let reachable = reachable_from(&slots, root);
        if let Some(orphan) = (0..slots.len()).find(|i| !reachable.contains(&SlotId(*i))) {
            return Err(malformed(format!(
                "slot {:?} is not reachable from root {:?}",
                slots[orphan].name, slots[root.0].name
            )));
        }

        Ok(Self {
            name,
            slots,
            root,
            topo,
        })
    }

    /// Build a pattern from its declarative config form.
    pub fn from_config(config: &PatternConfig) -> PatternResult<Self> {
        let malformed = |reason: String| PatternError::malformed(&config.name, reason);

        let mut ids = HashMap::new();
        for (i, slot) in config.slots.iter().enumerate() {
            if ids.insert(slot.name.as_str(), SlotId(i)).is_some() {
                return Err(malformed(format!("duplicate slot name {:?}", slot.name)));
            }
        }

        let mut slots = Vec::with_capacity(config.slots.len());
        for slot in &config.slots {
            let mut inputs = Vec::with_capacity(slot.inputs.len());
            for input in &slot.inputs {
                let spec = match input {
                    InputConfig::Slot(name) if name == InputConfig::ANY => InputSpec::any(),
                    InputConfig::Slot(name) => match ids.get(name.as_str()) {
                        Some(id) => InputSpec::Slot(*id),
                        None => {
                            return Err(malformed(format!(
                                "slot {:?} references unknown slot {name:?}",
                                slot.name
                            )));
                        }
                    },
                    InputConfig::Guard(filter) => InputSpec::Guard(NodeFilter::from(filter)),
                };
                inputs.push(spec);
            }
            let mut built = Slot::new(slot.name.clone(), NodeFilter::from(&slot.filter), inputs);
            if slot.commutative {
                built = built.commutative();
            }
            slots.push(built);
        }

        let root = ids
            .get(config.root.as_str())
            .copied()
            .ok_or_else(|| malformed(format!("root {:?} is not a slot", config.root)))?;

        Self::new(config.name.clone(), slots, root)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn root(&self) -> SlotId {
        self.root
    }

    pub fn root_slot(&self) -> &Slot {
        &self.slots[self.root.0]
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    pub fn slot_by_name(&self, name: &str) -> Option<SlotId> {
        self.slots.iter().position(|s| s.name == name).map(SlotId)
    }

    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &Slot)> {
        self.slots.iter().enumerate().map(|(i, s)| (SlotId(i), s))
    }

    /// Producers before consumers; ties keep declaration order.
    pub fn slots_topological(&self) -> &[SlotId] {
        &self.topo
    }

    pub fn inputs_of(&self, id: SlotId) -> &[InputSpec] {
        self.slots[id.0].inputs()
    }

    /// Bound predecessor slots of `id`, in input-index order.
    pub fn predecessors(&self, id: SlotId) -> Vec<SlotId> {
        self.slots[id.0]
            .inputs
            .iter()
            .filter_map(|input| match input {
                InputSpec::Slot(s) => Some(*s),
                InputSpec::Guard(_) => None,
            })
            .collect()
    }

    /// Declared edges as `(producer, consumer, input index)`.
    pub fn edges(&self) -> impl Iterator<Item = (SlotId, SlotId, usize)> + '_ {
        self.slots().flat_map(|(consumer, slot)| {
            slot.inputs.iter().enumerate().filter_map(move |(i, input)| match input {
                InputSpec::Slot(producer) => Some((*producer, consumer, i)),
                InputSpec::Guard(_) => None,
            })
        })
    }
}

fn non_commutative_kind(kind: &KindConstraint) -> Option<OpKind> {
    match kind {
        KindConstraint::Any => None,
        KindConstraint::Exact(k) => (!k.is_commutative()).then_some(*k),
        KindConstraint::OneOf(kinds) => kinds.iter().copied().find(|k| !k.is_commutative()),
    }
}

/// Kahn's algorithm with the smallest ready slot first. On a cycle, returns
/// one of the slots that could not be ordered.
fn topological_order(slots: &[Slot]) -> Result<Vec<SlotId>, SlotId> {
    let mut pending = vec![0usize; slots.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
    for (consumer, slot) in slots.iter().enumerate() {
        for input in &slot.inputs {
            if let InputSpec::Slot(producer) = input {
                pending[consumer] += 1;
                consumers[producer.0].push(consumer);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..slots.len()).filter(|i| pending[*i] == 0).collect();
    let mut order = Vec::with_capacity(slots.len());
    while let Some(next) = ready.pop_first() {
        order.push(SlotId(next));
        for &consumer in &consumers[next] {
            pending[consumer] -= 1;
            if pending[consumer] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if order.len() == slots.len() {
        Ok(order)
    } else {
        let stuck = (0..slots.len()).find(|i| pending[*i] > 0).unwrap_or(0);
        Err(SlotId(stuck))
    }
}

fn reachable_from(slots: &[Slot], root: SlotId) -> BTreeSet<SlotId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for input in &slots[id.0].inputs {
            if let InputSpec::Slot(producer) = input {
                stack.push(*producer);
            }
        }
    }
    seen
}

/// Code-first pattern construction.
///
/// ```
/// use graphtag_core::OpKind;
/// use graphtag_pattern::{InputSpec, PatternBuilder};
///
/// let mut p = PatternBuilder::new("add_sqrt");
/// let add = p.op("add", OpKind::Add, &[InputSpec::any(), InputSpec::kind(OpKind::Constant)]);
/// let sqrt = p.op("sqrt", OpKind::Sqrt, &[add.into()]);
/// let pattern = p.build(sqrt).unwrap();
/// assert_eq!(pattern.len(), 2);
/// ```
#[derive(Debug)]
pub struct PatternBuilder {
    name: String,
    slots: Vec<Slot>,
}

impl PatternBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
        }
    }

    /// Slot matching exactly one operation kind.
    pub fn op(
        &mut self,
        name: impl Into<String>,
        kind: OpKind,
        inputs: &[InputSpec],
    ) -> SlotId {
        self.slot(name, NodeFilter::kind(kind), inputs)
    }

    pub fn slot(&mut self, name: impl Into<String>, filter: NodeFilter, inputs: &[InputSpec]) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot::new(name, filter, inputs.to_vec()));
        id
    }

    /// Slot whose node's inputs are not inspected.
    pub fn leaf(&mut self, name: impl Into<String>, filter: NodeFilter) -> SlotId {
        self.slot(name, filter, &[])
    }

    pub fn commutative(&mut self, slot: SlotId) -> &mut Self {
        if let Some(s) = self.slots.get_mut(slot.0) {
            s.commutative = true;
        }
        self
    }

    pub fn build(self, root: SlotId) -> PatternResult<Pattern> {
        Pattern::new(self.name, self.slots, root)
    }
}
