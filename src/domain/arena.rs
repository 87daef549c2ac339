use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::domain::checksum::{Checksum, ChecksumService, Sha256Checksum};
use crate::domain::error::{DomainError, DomainResult};

/// Stable integer identity of a node. Ids are never reused within one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single position in the content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Content represented at this position
    pub value: String,
    /// Digest of `value`, kept in sync by the arena
    pub checksum: Checksum,
    /// Owning node, None for a subtree root
    pub parent: Option<NodeId>,
    /// Children in insertion (traversal) order
    pub children: Vec<NodeId>,
    /// Peer nodes that may substitute for this one; never children
    pub alternatives: Vec<NodeId>,
}

impl Node {
    fn new(id: NodeId, value: String, checksum: Checksum) -> Self {
        Self {
            id,
            value,
            checksum,
            parent: None,
            children: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Flat `{id -> Node}` mapping plus the id counter. Every relationship is
/// expressed by id, so this round-trips losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub next_id: u64,
    pub nodes: BTreeMap<NodeId, Node>,
}

/// Sole owner of node identity.
///
/// Every structural mutation goes through this type so that referential
/// integrity, acyclicity, checksum freshness and alternative hygiene are
/// enforced in one place.
#[derive(Debug, Clone)]
pub struct NodeArena {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    checksum: Arc<dyn ChecksumService>,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeArena {
    pub fn new() -> Self {
        Self::with_checksum(Arc::new(Sha256Checksum))
    }

    pub fn with_checksum(checksum: Arc<dyn ChecksumService>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
            checksum,
        }
    }

    pub fn digest(&self, value: &str) -> Checksum {
        self.checksum.digest(value)
    }

    /// Creates an unparented, childless node and returns its id.
    ///
    /// Fails only when the id space is exhausted; the counter never wraps.
    #[instrument(level = "trace", skip(self, value))]
    pub fn allocate(&mut self, value: impl Into<String>) -> DomainResult<NodeId> {
        let id = NodeId(self.next_id);
        let next = self
            .next_id
            .checked_add(1)
            .ok_or(DomainError::IdSpaceExhausted)?;
        let value = value.into();
        let checksum = self.checksum.digest(&value);
        self.nodes.insert(id, Node::new(id, value, checksum));
        self.next_id = next;
        trace!("allocated node {}", id);
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> DomainResult<&Node> {
        self.nodes.get(&id).ok_or(DomainError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomainResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(DomainError::NotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Updates the value and its checksum together.
    #[instrument(level = "trace", skip(self, value))]
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> DomainResult<()> {
        let value = value.into();
        let checksum = self.checksum.digest(&value);
        let node = self.node_mut(id)?;
        node.value = value;
        node.checksum = checksum;
        Ok(())
    }

    /// Appends `child` to `parent`'s children.
    ///
    /// Re-attaching a child to its current parent is a no-op.
    #[instrument(level = "trace", skip(self))]
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> DomainResult<()> {
        self.get(parent)?;
        match self.get(child)?.parent {
            Some(current) if current == parent => return Ok(()),
            Some(current) => {
                return Err(DomainError::AlreadyParented {
                    child,
                    parent: current,
                })
            }
            None => {}
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DomainError::CycleDetected { parent, child });
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Removes the parent/child link. The child becomes the root of its own
    /// subtree; nothing is deleted.
    #[instrument(level = "trace", skip(self))]
    pub fn detach_child(&mut self, parent: NodeId, child: NodeId) -> DomainResult<()> {
        self.get(parent)?;
        if self.get(child)?.parent != Some(parent) {
            return Err(DomainError::NotAChild { parent, child });
        }

        self.node_mut(parent)?.children.retain(|&c| c != child);
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// Registers `a` and `b` as alternatives of each other. Idempotent.
    #[instrument(level = "trace", skip(self))]
    pub fn add_alternative(&mut self, a: NodeId, b: NodeId) -> DomainResult<()> {
        self.get(a)?;
        self.get(b)?;
        if a == b {
            return Err(DomainError::SelfReference(a));
        }

        push_unique(&mut self.node_mut(a)?.alternatives, b);
        push_unique(&mut self.node_mut(b)?.alternatives, a);
        Ok(())
    }

    /// Drops the alternative link between `a` and `b` in both directions.
    pub fn remove_alternative(&mut self, a: NodeId, b: NodeId) -> DomainResult<()> {
        self.get(a)?;
        self.get(b)?;
        self.node_mut(a)?.alternatives.retain(|&x| x != b);
        self.node_mut(b)?.alternatives.retain(|&x| x != a);
        Ok(())
    }

    /// Deletes a node, or its whole subtree when `cascade` is set.
    ///
    /// The node is unlinked from its parent and every removed id is purged from
    /// all alternative lists. Returns the removed ids in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, id: NodeId, cascade: bool) -> DomainResult<Vec<NodeId>> {
        let node = self.get(id)?;
        if !node.children.is_empty() && !cascade {
            return Err(DomainError::HasChildren(id));
        }
        let parent = node.parent;
        let removed = self.subtree_ids(id);

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.retain(|&c| c != id);
            }
        }

        let gone: HashSet<NodeId> = removed.iter().copied().collect();
        for removed_id in &removed {
            self.nodes.remove(removed_id);
        }
        for node in self.nodes.values_mut() {
            node.alternatives.retain(|a| !gone.contains(a));
        }

        debug!("removed {} node(s) starting at {}", removed.len(), id);
        Ok(removed)
    }

    /// All nodes carrying the given checksum, in id order.
    pub fn find_by_checksum(&self, checksum: &Checksum) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| &node.checksum == checksum)
            .map(|node| node.id)
            .collect()
    }

    fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                ids.push(current);
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        ids
    }

    /// True if `ancestor` is `node` or lies on `node`'s parent chain.
    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            next_id: self.next_id,
            nodes: self.nodes.clone(),
        }
    }

    /// Rebuilds an arena from a snapshot, rejecting anything that breaks the
    /// arena invariants or carries a stale checksum.
    #[instrument(level = "debug", skip_all)]
    pub fn from_snapshot(
        snapshot: ArenaSnapshot,
        checksum: Arc<dyn ChecksumService>,
    ) -> DomainResult<Self> {
        let arena = Self {
            nodes: snapshot.nodes,
            next_id: snapshot.next_id,
            checksum,
        };
        arena.verify()?;
        debug!("loaded snapshot with {} nodes", arena.len());
        Ok(arena)
    }

    /// Checks every arena invariant on the current contents.
    pub fn verify(&self) -> DomainResult<()> {
        for (key, node) in &self.nodes {
            if *key != node.id {
                return Err(invalid(format!("key {} holds node {}", key, node.id)));
            }
            if node.id.0 >= self.next_id {
                return Err(invalid(format!(
                    "node {} is not below next id {}",
                    node.id, self.next_id
                )));
            }
            if self.checksum.digest(&node.value) != node.checksum {
                return Err(DomainError::ChecksumMismatch(node.id));
            }

            if let Some(parent_id) = node.parent {
                let parent = self.nodes.get(&parent_id).ok_or_else(|| {
                    invalid(format!("{} has dangling parent {}", node.id, parent_id))
                })?;
                let listed = parent.children.iter().filter(|&&c| c == node.id).count();
                if listed != 1 {
                    return Err(invalid(format!(
                        "{} is listed {} time(s) among the children of {}",
                        node.id, listed, parent_id
                    )));
                }
            }

            let mut seen = HashSet::new();
            for &child_id in &node.children {
                if !seen.insert(child_id) {
                    return Err(invalid(format!("{} lists child {} twice", node.id, child_id)));
                }
                let child = self.nodes.get(&child_id).ok_or_else(|| {
                    invalid(format!("{} has dangling child {}", node.id, child_id))
                })?;
                if child.parent != Some(node.id) {
                    return Err(invalid(format!(
                        "child {} does not point back to {}",
                        child_id, node.id
                    )));
                }
            }

            let mut seen = HashSet::new();
            for &alt in &node.alternatives {
                if alt == node.id {
                    return Err(invalid(format!("{} lists itself as alternative", node.id)));
                }
                if !seen.insert(alt) {
                    return Err(invalid(format!("{} lists alternative {} twice", node.id, alt)));
                }
                if !self.nodes.contains_key(&alt) {
                    return Err(invalid(format!("{} has dangling alternative {}", node.id, alt)));
                }
            }
        }

        for node in self.nodes.values() {
            let mut steps = 0;
            let mut current = node.parent;
            while let Some(parent_id) = current {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(invalid(format!("cycle through node {}", node.id)));
                }
                current = self.nodes.get(&parent_id).and_then(|n| n.parent);
            }
        }
        Ok(())
    }
}

fn invalid(reason: String) -> DomainError {
    DomainError::InvalidSnapshot(reason)
}

fn push_unique(ids: &mut Vec<NodeId>, id: NodeId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with(values: &[&str]) -> (NodeArena, Vec<NodeId>) {
        let mut arena = NodeArena::new();
        let ids = values
            .iter()
            .map(|v| arena.allocate(*v).unwrap())
            .collect();
        (arena, ids)
    }

    #[test]
    fn test_allocate_sets_checksum_and_empty_links() {
        let (arena, ids) = arena_with(&["src"]);
        let node = arena.get(ids[0]).unwrap();
        assert_eq!(node.value, "src");
        assert_eq!(node.checksum, arena.digest("src"));
        assert!(node.parent.is_none());
        assert!(node.children.is_empty());
        assert!(node.alternatives.is_empty());
    }

    #[test]
    fn test_set_value_recomputes_checksum() {
        let (mut arena, ids) = arena_with(&["old"]);
        arena.set_value(ids[0], "new").unwrap();
        let node = arena.get(ids[0]).unwrap();
        assert_eq!(node.value, "new");
        assert_eq!(node.checksum, arena.digest("new"));
    }

    #[test]
    fn test_set_value_missing_node() {
        let mut arena = NodeArena::new();
        assert_eq!(
            arena.set_value(NodeId::new(7), "x"),
            Err(DomainError::NotFound(NodeId::new(7)))
        );
    }

    #[test]
    fn test_ids_are_not_reused_after_remove() {
        let (mut arena, ids) = arena_with(&["a", "b"]);
        arena.remove(ids[1], false).unwrap();
        let c = arena.allocate("c").unwrap();
        assert!(c > ids[1]);
    }

    #[test]
    fn test_attach_same_parent_twice_is_noop() {
        let (mut arena, ids) = arena_with(&["a", "b"]);
        arena.attach_child(ids[0], ids[1]).unwrap();
        arena.attach_child(ids[0], ids[1]).unwrap();
        assert_eq!(arena.get(ids[0]).unwrap().children, vec![ids[1]]);
    }

    #[test]
    fn test_attach_to_self_is_cycle() {
        let (mut arena, ids) = arena_with(&["a"]);
        assert_eq!(
            arena.attach_child(ids[0], ids[0]),
            Err(DomainError::CycleDetected {
                parent: ids[0],
                child: ids[0]
            })
        );
    }

    #[test]
    fn test_add_alternative_is_symmetric_and_idempotent() {
        let (mut arena, ids) = arena_with(&["x", "x"]);
        arena.add_alternative(ids[0], ids[1]).unwrap();
        arena.add_alternative(ids[1], ids[0]).unwrap();
        assert_eq!(arena.get(ids[0]).unwrap().alternatives, vec![ids[1]]);
        assert_eq!(arena.get(ids[1]).unwrap().alternatives, vec![ids[0]]);
    }

    #[test]
    fn test_remove_alternative_drops_both_directions() {
        let (mut arena, ids) = arena_with(&["x", "x"]);
        arena.add_alternative(ids[0], ids[1]).unwrap();
        arena.remove_alternative(ids[1], ids[0]).unwrap();
        assert!(arena.get(ids[0]).unwrap().alternatives.is_empty());
        assert!(arena.get(ids[1]).unwrap().alternatives.is_empty());
    }

    #[test]
    fn test_remove_purges_alternatives() {
        let (mut arena, ids) = arena_with(&["x", "x", "x"]);
        arena.add_alternative(ids[0], ids[1]).unwrap();
        arena.add_alternative(ids[0], ids[2]).unwrap();
        arena.remove(ids[1], false).unwrap();
        assert_eq!(arena.get(ids[0]).unwrap().alternatives, vec![ids[2]]);
    }

    #[test]
    fn test_find_by_checksum_groups_equal_values() {
        let (arena, ids) = arena_with(&["same", "other", "same"]);
        let sum = arena.digest("same");
        assert_eq!(arena.find_by_checksum(&sum), vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_allocate_fails_on_exhausted_id_space() {
        let snapshot = ArenaSnapshot {
            next_id: u64::MAX,
            nodes: BTreeMap::new(),
        };
        let mut arena = NodeArena::from_snapshot(snapshot, Arc::new(Sha256Checksum)).unwrap();
        assert_eq!(arena.allocate("x"), Err(DomainError::IdSpaceExhausted));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_snapshot_roundtrip_through_json() {
        let (mut arena, ids) = arena_with(&["root", "child", "alt"]);
        arena.attach_child(ids[0], ids[1]).unwrap();
        arena.add_alternative(ids[1], ids[2]).unwrap();

        let json = serde_json::to_string(&arena.snapshot()).unwrap();
        let snapshot: ArenaSnapshot = serde_json::from_str(&json).unwrap();
        let restored = NodeArena::from_snapshot(snapshot, Arc::new(Sha256Checksum)).unwrap();

        assert_eq!(restored.snapshot(), arena.snapshot());
    }

    #[test]
    fn test_snapshot_with_stale_checksum_is_rejected() {
        let (arena, ids) = arena_with(&["a"]);
        let mut snapshot = arena.snapshot();
        snapshot.nodes.get_mut(&ids[0]).unwrap().value = "tampered".into();
        assert_eq!(
            NodeArena::from_snapshot(snapshot, Arc::new(Sha256Checksum)).unwrap_err(),
            DomainError::ChecksumMismatch(ids[0])
        );
    }

    #[test]
    fn test_snapshot_with_dangling_child_is_rejected() {
        let (arena, ids) = arena_with(&["a"]);
        let mut snapshot = arena.snapshot();
        snapshot
            .nodes
            .get_mut(&ids[0])
            .unwrap()
            .children
            .push(NodeId::new(42));
        assert!(matches!(
            NodeArena::from_snapshot(snapshot, Arc::new(Sha256Checksum)),
            Err(DomainError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_with_parent_cycle_is_rejected() {
        let (mut arena, ids) = arena_with(&["a", "b"]);
        arena.attach_child(ids[0], ids[1]).unwrap();
        let mut snapshot = arena.snapshot();
        let a = snapshot.nodes.get_mut(&ids[0]).unwrap();
        a.parent = Some(ids[1]);
        snapshot.nodes.get_mut(&ids[1]).unwrap().children.push(ids[0]);
        assert!(matches!(
            NodeArena::from_snapshot(snapshot, Arc::new(Sha256Checksum)),
            Err(DomainError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_with_self_alternative_is_rejected() {
        let (arena, ids) = arena_with(&["a"]);
        let mut snapshot = arena.snapshot();
        snapshot
            .nodes
            .get_mut(&ids[0])
            .unwrap()
            .alternatives
            .push(ids[0]);
        assert!(matches!(
            NodeArena::from_snapshot(snapshot, Arc::new(Sha256Checksum)),
            Err(DomainError::InvalidSnapshot(_))
        ));
    }
}
