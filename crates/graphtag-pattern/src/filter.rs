//! Node filters: what a graph node must look like to fill a pattern position.

use graphtag_core::{FilterConfig, Node, OpKind};

/// Absolute tolerance used by [`AttrPredicate::scalar`].
pub const DEFAULT_SCALAR_TOLERANCE: f64 = 1e-9;

/// Constraint on a node's operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindConstraint {
    Any,
    Exact(OpKind),
    OneOf(Vec<OpKind>),
}

impl KindConstraint {
    pub fn admits(&self, kind: OpKind) -> bool {
        match self {
            KindConstraint::Any => true,
            KindConstraint::Exact(k) => *k == kind,
            KindConstraint::OneOf(kinds) => kinds.contains(&kind),
        }
    }
}

/// Predicate over a node's metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrPredicate {
    IsConstant,
    ScalarNear { value: f64, tolerance: f64 },
    ShapeEq(Vec<usize>),
    Rank(usize),
    DimEq { axis: usize, size: usize },
    ElementType(String),
}

impl AttrPredicate {
    pub fn scalar(value: f64) -> Self {
        AttrPredicate::ScalarNear {
            value,
            tolerance: DEFAULT_SCALAR_TOLERANCE,
        }
    }

    /// Missing metadata never satisfies a metadata predicate.
    pub fn holds(&self, node: &Node) -> bool {
        let attrs = &node.attrs;
        match self {
            AttrPredicate::IsConstant => node.is_constant(),
            AttrPredicate::ScalarNear { value, tolerance } => attrs
                .scalar
                .is_some_and(|s| (s - value).abs() <= *tolerance),
            AttrPredicate::ShapeEq(dims) => attrs.shape.as_deref() == Some(dims.as_slice()),
            AttrPredicate::Rank(rank) => attrs.shape.as_ref().is_some_and(|s| s.len() == *rank),
            AttrPredicate::DimEq { axis, size } => attrs
                .shape
                .as_ref()
                .and_then(|s| s.get(*axis))
                .is_some_and(|d| d == size),
            AttrPredicate::ElementType(name) => attrs.element_type.as_deref() == Some(name.as_str()),
        }
    }
}

/// Kind constraint plus attribute predicates, all of which must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFilter {
    pub kind: KindConstraint,
    pub predicates: Vec<AttrPredicate>,
}

impl NodeFilter {
    pub fn any() -> Self {
        Self {
            kind: KindConstraint::Any,
            predicates: Vec::new(),
        }
    }

    pub fn kind(kind: OpKind) -> Self {
        Self {
            kind: KindConstraint::Exact(kind),
            predicates: Vec::new(),
        }
    }

    pub fn one_of(kinds: impl IntoIterator<Item = OpKind>) -> Self {
        Self {
            kind: KindConstraint::OneOf(kinds.into_iter().collect()),
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, predicate: AttrPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_any(&self) -> bool {
        self.kind == KindConstraint::Any && self.predicates.is_empty()
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.kind.admits(node.op) && self.predicates.iter().all(|p| p.holds(node))
    }
}

impl From<&FilterConfig> for NodeFilter {
    fn from(config: &FilterConfig) -> Self {
        let mut kinds: Vec<OpKind> = config.op.into_iter().collect();
        for kind in &config.ops {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        let kind = match kinds.as_slice() {
            [] => KindConstraint::Any,
            [single] => KindConstraint::Exact(*single),
            _ => KindConstraint::OneOf(kinds),
        };

        let mut filter = NodeFilter {
            kind,
            predicates: Vec::new(),
        };
        if config.constant {
            filter = filter.with(AttrPredicate::IsConstant);
        }
        if let Some(shape) = &config.shape {
            filter = filter.with(AttrPredicate::ShapeEq(shape.clone()));
        }
        if let Some(rank) = config.rank {
            filter = filter.with(AttrPredicate::Rank(rank));
        }
        if let Some(value) = config.scalar {
            filter = filter.with(AttrPredicate::scalar(value));
        }
        if let Some(ty) = &config.element_type {
            filter = filter.with(AttrPredicate::ElementType(ty.clone()));
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphtag_core::{GraphBuilder, NodeAttrs};

    fn node_with(op: OpKind, attrs: NodeAttrs) -> Node {
        let mut b = GraphBuilder::new();
        let id = b.add_with_attrs("n", op, &[], attrs).unwrap();
        b.build().node(id).unwrap().clone()
    }

    #[test]
    fn kind_constraints() {
        assert!(KindConstraint::Any.admits(OpKind::Gather));
        assert!(KindConstraint::Exact(OpKind::Sqrt).admits(OpKind::Sqrt));
        assert!(!KindConstraint::Exact(OpKind::Sqrt).admits(OpKind::Add));
        let set = KindConstraint::OneOf(vec![OpKind::Add, OpKind::Multiply]);
        assert!(set.admits(OpKind::Multiply));
        assert!(!set.admits(OpKind::Divide));
    }

    #[test]
    fn scalar_predicate_uses_tolerance() {
        let two = node_with(
            OpKind::Constant,
            NodeAttrs {
                scalar: Some(2.0),
                ..NodeAttrs::default()
            },
        );
        assert!(AttrPredicate::scalar(2.0).holds(&two));
        assert!(!AttrPredicate::scalar(3.0).holds(&two));
        assert!(
            AttrPredicate::ScalarNear {
                value: 2.05,
                tolerance: 0.1
            }
            .holds(&two)
        );
    }

    #[test]
    fn shape_predicates() {
        let table = node_with(
            OpKind::Constant,
            NodeAttrs {
                shape: Some(vec![151936, 1024]),
                ..NodeAttrs::default()
            },
        );
        assert!(AttrPredicate::ShapeEq(vec![151936, 1024]).holds(&table));
        assert!(AttrPredicate::Rank(2).holds(&table));
        assert!(AttrPredicate::DimEq { axis: 1, size: 1024 }.holds(&table));
        assert!(!AttrPredicate::DimEq { axis: 2, size: 1024 }.holds(&table));
    }

    #[test]
    fn missing_metadata_fails_predicates() {
        let bare = node_with(OpKind::Opaque, NodeAttrs::default());
        assert!(!AttrPredicate::Rank(0).holds(&bare));
        assert!(!AttrPredicate::scalar(0.0).holds(&bare));
        assert!(!AttrPredicate::ElementType("f32".to_string()).holds(&bare));
        assert!(!AttrPredicate::IsConstant.holds(&bare));
    }

    #[test]
    fn filter_requires_kind_and_every_predicate() {
        let c = node_with(
            OpKind::Constant,
            NodeAttrs {
                scalar: Some(1.0),
                element_type: Some("f32".to_string()),
                ..NodeAttrs::default()
            },
        );
        let filter = NodeFilter::kind(OpKind::Constant)
            .with(AttrPredicate::scalar(1.0))
            .with(AttrPredicate::ElementType("f32".to_string()));
        assert!(filter.matches(&c));
        assert!(!filter.clone().with(AttrPredicate::Rank(3)).matches(&c));
        assert!(!NodeFilter::kind(OpKind::Parameter).matches(&c));
        assert!(NodeFilter::any().matches(&c));
    }

    #[test]
    fn converts_filter_config() {
        let config = FilterConfig {
            op: Some(OpKind::Add),
            ops: vec![OpKind::Multiply, OpKind::Add],
            shape: Some(vec![4]),
            ..FilterConfig::default()
        };
        let filter = NodeFilter::from(&config);
        assert_eq!(filter.kind, KindConstraint::OneOf(vec![OpKind::Add, OpKind::Multiply]));
        assert_eq!(filter.predicates, vec![AttrPredicate::ShapeEq(vec![4])]);

        assert!(NodeFilter::from(&FilterConfig::default()).is_any());
    }
}
