//! Shared types used across graphtag crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Identity of a node inside one graph snapshot.
///
/// Ids are dense and follow creation order, so iterating ids in ascending
/// order visits producers before their consumers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operation kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Parameter,
    Constant,
    Power,
    ReduceMean,
    Add,
    Subtract,
    Multiply,
    Divide,
    Sqrt,
    Convert,
    Gather,
    MatMul,
    Softmax,
    Reshape,
    Result,
    /// Any operation outside the set above.
    #[serde(other)]
    Opaque,
}

impl OpKind {
    pub const ALL: [OpKind; 16] = [
        OpKind::Parameter,
        OpKind::Constant,
        OpKind::Power,
        OpKind::ReduceMean,
        OpKind::Add,
        OpKind::Subtract,
        OpKind::Multiply,
        OpKind::Divide,
        OpKind::Sqrt,
        OpKind::Convert,
        OpKind::Gather,
        OpKind::MatMul,
        OpKind::Softmax,
        OpKind::Reshape,
        OpKind::Result,
        OpKind::Opaque,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Parameter => "parameter",
            OpKind::Constant => "constant",
            OpKind::Power => "power",
            OpKind::ReduceMean => "reduce_mean",
            OpKind::Add => "add",
            OpKind::Subtract => "subtract",
            OpKind::Multiply => "multiply",
            OpKind::Divide => "divide",
            OpKind::Sqrt => "sqrt",
            OpKind::Convert => "convert",
            OpKind::Gather => "gather",
            OpKind::MatMul => "mat_mul",
            OpKind::Softmax => "softmax",
            OpKind::Reshape => "reshape",
            OpKind::Result => "result",
            OpKind::Opaque => "opaque",
        }
    }

    /// Whether swapping the two inputs leaves the result unchanged.
    pub fn is_commutative(&self) -> bool {
        matches!(self, OpKind::Add | OpKind::Multiply)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses both `snake_case` and `CamelCase` spellings (`reduce_mean`,
/// `ReduceMean`, `reduce-mean`).
impl FromStr for OpKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_ident(s);
        OpKind::ALL
            .into_iter()
            .find(|kind| normalize_ident(kind.as_str()) == wanted)
            .ok_or_else(|| GraphError::UnknownOpKind(s.to_string()))
    }
}

/// Lowercases an identifier and drops `_`, `-` and spaces, so that
/// `RMSNorm`, `rms_norm` and `rms-norm` compare equal.
pub fn normalize_ident(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Optional per-node metadata consulted by attribute predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Output shape, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    /// Value of a scalar constant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<f64>,
    /// Element type name ("f32", "i64", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
}

/// One vertex of a computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op: OpKind,
    /// Producers feeding this node, in input-index order.
    pub inputs: Vec<NodeId>,
    pub attrs: NodeAttrs,
}

impl Node {
    pub fn is_constant(&self) -> bool {
        self.op == OpKind::Constant
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_kind_parses_both_spellings() {
        assert_eq!("reduce_mean".parse::<OpKind>().unwrap(), OpKind::ReduceMean);
        assert_eq!("ReduceMean".parse::<OpKind>().unwrap(), OpKind::ReduceMean);
        assert_eq!("Sqrt".parse::<OpKind>().unwrap(), OpKind::Sqrt);
        assert_eq!("MatMul".parse::<OpKind>().unwrap(), OpKind::MatMul);
    }

    #[test]
    fn unknown_op_kind_is_an_error() {
        let err = "Einsum".parse::<OpKind>().unwrap_err();
        assert!(matches!(err, GraphError::UnknownOpKind(ref s) if s == "Einsum"));
    }

    #[test]
    fn op_kind_display_round_trips_through_from_str() {
        for kind in OpKind::ALL {
            assert_eq!(kind.to_string().parse::<OpKind>().unwrap(), kind);
        }
    }

    #[test]
    fn serde_maps_unknown_kinds_to_opaque() {
        let kind: OpKind = serde_json::from_str("\"einsum\"").unwrap();
        assert_eq!(kind, OpKind::Opaque);
        let kind: OpKind = serde_json::from_str("\"reduce_mean\"").unwrap();
        assert_eq!(kind, OpKind::ReduceMean);
    }

    #[test]
    fn normalize_ident_ignores_case_and_separators() {
        assert_eq!(normalize_ident("RMSNorm"), normalize_ident("rms_norm"));
        assert_eq!(normalize_ident("rms-norm"), "rmsnorm");
    }

    #[test]
    fn commutative_kinds() {
        assert!(OpKind::Add.is_commutative());
        assert!(OpKind::Multiply.is_commutative());
        assert!(!OpKind::Subtract.is_commutative());
        assert!(!OpKind::Power.is_commutative());
    }
}
