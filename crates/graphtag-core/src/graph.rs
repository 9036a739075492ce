//! Immutable computation-graph snapshot.
//!
//! Nodes are stored in creation order and every input must reference an
//! earlier node, which makes creation order a topological order and rules
//! out cycles by construction. A snapshot is never mutated once built;
//! rule passes borrow it immutably.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::types::{Node, NodeAttrs, NodeId, OpKind};

/// Read-only graph snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
}

impl Graph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.by_name.get(name).and_then(|id| self.node(*id))
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Name of a node, or its `#id` form when the id is out of range.
    pub fn display_name(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Build a snapshot from its serialized description.
    pub fn from_spec(spec: &GraphSpec) -> GraphResult<Self> {
        let declared: HashSet<&str> = spec.nodes.iter().map(|n| n.name.as_str()).collect();
        let mut builder = GraphBuilder::new();

        for node in &spec.nodes {
            let mut inputs = Vec::with_capacity(node.inputs.len());
            for input in &node.inputs {
                match builder.id_of(input) {
                    Some(id) => inputs.push(id),
                    None if declared.contains(input.as_str()) => {
                        return Err(GraphError::ForwardReference {
                            node: node.name.clone(),
                            input: input.clone(),
                        });
                    }
                    None => {
                        return Err(GraphError::UnknownInput {
                            node: node.name.clone(),
                            input: input.clone(),
                        });
                    }
                }
            }
            builder.add_with_attrs(node.name.clone(), node.op, &inputs, node.attrs.clone())?;
        }

        Ok(builder.build())
    }

    pub fn from_json_str(json: &str) -> GraphResult<Self> {
        let spec: GraphSpec = serde_json::from_str(json)?;
        Self::from_spec(&spec)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&content)?)
    }

    /// Serializable description of this snapshot.
    pub fn to_spec(&self) -> GraphSpec {
        GraphSpec {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeSpec {
                    name: n.name.clone(),
                    op: n.op,
                    inputs: n.inputs.iter().map(|id| self.display_name(*id)).collect(),
                    attrs: n.attrs.clone(),
                })
                .collect(),
        }
    }
}

fn node_id_at(index: usize) -> Option<NodeId> {
    u32::try_from(index).ok().map(NodeId)
}

/// Incremental graph construction.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        op: OpKind,
        inputs: &[NodeId],
    ) -> GraphResult<NodeId> {
        self.add_with_attrs(name, op, inputs, NodeAttrs::default())
    }

    /// Append a node. Inputs must already exist in the builder.
    pub fn add_with_attrs(
        &mut self,
        name: impl Into<String>,
        op: OpKind,
        inputs: &[NodeId],
        attrs: NodeAttrs,
    ) -> GraphResult<NodeId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        if let Some(bad) = inputs.iter().find(|id| id.index() >= self.nodes.len()) {
            return Err(GraphError::ForwardReference {
                node: name,
                input: bad.to_string(),
            });
        }

        let id = node_id_at(self.nodes.len())
            .ok_or_else(|| GraphError::TooManyNodes { node: name.clone() })?;
        self.by_name.insert(name.clone(), id);
        self.nodes.push(Node {
            id,
            name,
            op,
            inputs: inputs.to_vec(),
            attrs,
        });
        Ok(id)
    }

    pub fn parameter(&mut self, name: impl Into<String>, shape: &[usize]) -> GraphResult<NodeId> {
        let attrs = NodeAttrs {
            shape: Some(shape.to_vec()),
            ..NodeAttrs::default()
        };
        self.add_with_attrs(name, OpKind::Parameter, &[], attrs)
    }

    /// Scalar constant.
    pub fn constant(&mut self, name: impl Into<String>, value: f64) -> GraphResult<NodeId> {
        let attrs = NodeAttrs {
            shape: Some(Vec::new()),
            scalar: Some(value),
            ..NodeAttrs::default()
        };
        self.add_with_attrs(name, OpKind::Constant, &[], attrs)
    }

    pub fn build(self) -> Graph {
        Graph {
            nodes: self.nodes,
            by_name: self.by_name,
        }
    }
}

/// JSON form of a graph snapshot. Inputs reference nodes by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub op: OpKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(flatten)]
    pub attrs: NodeAttrs,
}
