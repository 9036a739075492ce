//! Node → group registry.
//!
//! The partitioner clusters nodes into groups and later assigns each group
//! to a device. Rules only see groups through [`GroupRegistry::group_of`]
//! and may only add avoid tags; nothing here removes one.
//!
//! [`GroupHandle`] is `Clone + Send + Sync`. Tagging is a set union behind a
//! per-group lock, so rules sharing a registry commute and may run on
//! separate threads.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use graphtag_core::{Graph, NodeId};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Lookup miss: the node is not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("node {0} has no registered group")]
pub struct UnknownNode(pub NodeId);

/// Registration refused: another live group already carries the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} is already used by another group")]
pub struct GroupIdInUse(pub GroupId);

/// A partition-candidate cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    members: BTreeSet<NodeId>,
    avoided: BTreeSet<String>,
}

impl Group {
    pub fn new(id: GroupId, members: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            id,
            members: members.into_iter().collect(),
            avoided: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn members(&self) -> &BTreeSet<NodeId> {
        &self.members
    }

    pub fn avoided_devices(&self) -> &BTreeSet<String> {
        &self.avoided
    }

    pub fn avoids(&self, device: &str) -> bool {
        self.avoided.contains(device)
    }

    /// Returns `true` if the tag was not present before.
    pub fn avoid(&mut self, device: &str) -> bool {
        if self.avoided.contains(device) {
            return false;
        }
        self.avoided.insert(device.to_string())
    }

    fn absorb(&mut self, other: Group) {
        self.members.extend(other.members);
        self.avoided.extend(other.avoided);
    }
}

/// Shared, lockable reference to a [`Group`].
#[derive(Debug, Clone)]
pub struct GroupHandle(Arc<Mutex<Group>>);

impl GroupHandle {
    pub fn new(group: Group) -> Self {
        Self(Arc::new(Mutex::new(group)))
    }

    // Tag sets are append-only, so a panic while holding the lock cannot
    // leave a half-applied update behind.
    fn lock(&self) -> MutexGuard<'_, Group> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> GroupId {
        self.lock().id
    }

    /// Idempotent: tagging an already-avoided device is a no-op that
    /// returns `false`.
    pub fn avoid(&self, device: &str) -> bool {
        self.lock().avoid(device)
    }

    pub fn avoids(&self, device: &str) -> bool {
        self.lock().avoids(device)
    }

    pub fn avoided_devices(&self) -> BTreeSet<String> {
        self.lock().avoided.clone()
    }

    pub fn members(&self) -> BTreeSet<NodeId> {
        self.lock().members.clone()
    }

    /// Copy of the current group state.
    pub fn snapshot(&self) -> Group {
        self.lock().clone()
    }

    pub fn same_group(&self, other: &GroupHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Node → group lookup required by avoid rules.
pub trait GroupRegistry {
    fn group_of(&self, node: NodeId) -> Result<GroupHandle, UnknownNode>;
}

/// Registry built from one graph snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    groups: BTreeMap<NodeId, GroupHandle>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// One singleton group per node; group ids follow node ids.
    pub fn from_graph(graph: &Graph) -> Self {
        let groups = graph
            .nodes()
            .iter()
            .map(|node| {
                let group = Group::new(GroupId(node.id.0), [node.id]);
                (node.id, GroupHandle::new(group))
            })
            .collect();
        Self { groups }
    }

    /// Register `node` in a fresh singleton group with id `id`.
    ///
    /// A previous registration of `node` is replaced and the node leaves its
    /// old group. Group ids stay unique: `id` may only be reused if no other
    /// registered node's group carries it.
    pub fn register(&mut self, node: NodeId, id: GroupId) -> Result<GroupHandle, GroupIdInUse> {
        if self.groups.iter().any(|(other, handle)| *other != node && handle.id() == id) {
            return Err(GroupIdInUse(id));
        }
        if let Some(previous) = self.groups.get(&node) {
            previous.lock().members.remove(&node);
        }
        let handle = GroupHandle::new(Group::new(id, [node]));
        self.groups.insert(node, handle.clone());
        Ok(handle)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.groups.contains_key(&node)
    }

    /// Coalesce the groups of `a` and `b`.
    ///
    /// The group with the smaller id survives and takes the union of both
    /// member sets and both avoid-tag sets; every member is re-pointed to
    /// it. Merging a group with itself changes nothing.
    pub fn merge(&mut self, a: NodeId, b: NodeId) -> Result<GroupHandle, UnknownNode> {
        let ga = self.group_of(a)?;
        let gb = self.group_of(b)?;
        if ga.same_group(&gb) {
            return Ok(ga);
        }

        let (keep, gone) = if ga.id() <= gb.id() { (ga, gb) } else { (gb, ga) };
        let absorbed = gone.snapshot();
        let moved: Vec<NodeId> = absorbed.members.iter().copied().collect();
        debug!(
            keep = %keep.id(),
            gone = %absorbed.id,
            moved = moved.len(),
            "merging groups"
        );
        keep.lock().absorb(absorbed);
        for node in moved {
            self.groups.insert(node, keep.clone());
        }
        Ok(keep)
    }

    /// Distinct groups, ordered by id.
    pub fn groups(&self) -> Vec<GroupHandle> {
        let mut by_id: BTreeMap<GroupId, GroupHandle> = BTreeMap::new();
        for handle in self.groups.values() {
            by_id.entry(handle.id()).or_insert_with(|| handle.clone());
        }
        by_id.into_values().collect()
    }

    /// Avoid tags seen by each node through its group.
    pub fn avoided_by_node(&self) -> BTreeMap<NodeId, BTreeSet<String>> {
        self.groups
            .iter()
            .map(|(node, handle)| (*node, handle.avoided_devices()))
            .collect()
    }
}

impl GroupRegistry for Snapshot {
    fn group_of(&self, node: NodeId) -> Result<GroupHandle, UnknownNode> {
        self.groups.get(&node).cloned().ok_or(UnknownNode(node))
    }
}
