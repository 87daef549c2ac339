//! Navigable tree on top of the node arena.
//!
//! Navigation follows `children` only; alternatives are resolved as an
//! equivalence class over the symmetrized alternative edges.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use tracing::{debug, instrument, trace};

use crate::domain::arena::{ArenaSnapshot, Node, NodeArena, NodeId};
use crate::domain::checksum::ChecksumService;
use crate::domain::error::{DomainError, DomainResult};

/// Arena-backed tree with alternative resolution.
#[derive(Debug, Clone, Default)]
pub struct ArenaTree {
    arena: NodeArena,
    /// Built on first query, dropped by [`ArenaTree::arena_mut`].
    index: OnceLock<TreeIndex>,
}

/// Derived lookups over the arena.
#[derive(Debug, Clone, Default)]
struct TreeIndex {
    /// Stored alternative edges, reversed.
    inbound: HashMap<NodeId, Vec<NodeId>>,
    /// Nodes without parent, ascending.
    parentless: Vec<NodeId>,
}

impl TreeIndex {
    fn build(arena: &NodeArena) -> Self {
        let mut index = Self::default();
        for node in arena.iter() {
            if node.parent.is_none() {
                index.parentless.push(node.id);
            }
            for &alt in &node.alternatives {
                index.inbound.entry(alt).or_default().push(node.id);
            }
        }
        trace!(
            "indexed {} nodes, {} parentless",
            arena.len(),
            index.parentless.len()
        );
        index
    }
}

impl From<NodeArena> for ArenaTree {
    fn from(arena: NodeArena) -> Self {
        Self {
            arena,
            index: OnceLock::new(),
        }
    }
}

impl ArenaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checksum(checksum: Arc<dyn ChecksumService>) -> Self {
        Self::from(NodeArena::with_checksum(checksum))
    }

    pub fn from_snapshot(
        snapshot: ArenaSnapshot,
        checksum: Arc<dyn ChecksumService>,
    ) -> DomainResult<Self> {
        NodeArena::from_snapshot(snapshot, checksum).map(Self::from)
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        self.index.take();
        &mut self.arena
    }

    pub fn get(&self, id: NodeId) -> DomainResult<&Node> {
        self.arena.get(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn index(&self) -> &TreeIndex {
        self.index.get_or_init(|| TreeIndex::build(&self.arena))
    }

    /// The unique root of the tree.
    ///
    /// Parentless nodes that are alternatives of the lowest-id parentless node
    /// and carry its checksum count as the same root (merged versions of one
    /// folder); that lowest id is returned. Any other parentless node makes the
    /// tree ambiguous.
    #[instrument(level = "trace", skip(self))]
    pub fn root(&self) -> DomainResult<NodeId> {
        let (anchor, class) = self.root_class()?;
        let strays: Vec<NodeId> = self
            .index()
            .parentless
            .iter()
            .filter(|id| !class.contains(id))
            .copied()
            .collect();
        if !strays.is_empty() {
            let mut roots = vec![anchor];
            roots.extend(strays);
            return Err(DomainError::MultipleRoots(roots));
        }
        Ok(anchor)
    }

    /// Lowest-id parentless node and every parentless, same-checksum member of
    /// its alternative class (anchor included).
    fn root_class(&self) -> DomainResult<(NodeId, BTreeSet<NodeId>)> {
        let anchor = *self.index().parentless.first().ok_or(DomainError::Empty)?;
        let checksum = &self.arena.get(anchor)?.checksum;

        let mut class = BTreeSet::from([anchor]);
        for alt in self.resolve_alternatives(anchor)? {
            let node = self.arena.get(alt)?;
            if node.parent.is_none() && &node.checksum == checksum {
                class.insert(alt);
            }
        }
        Ok((anchor, class))
    }

    /// Full equivalence set of `id` under the alternative relation, without `id`.
    ///
    /// Edges are followed in both directions, so the result is the same for
    /// every member of the set even if only one direction is stored.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve_alternatives(&self, id: NodeId) -> DomainResult<BTreeSet<NodeId>> {
        self.arena.get(id)?;
        let inbound = &self.index().inbound;

        let mut seen = BTreeSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let outbound = self
                .arena
                .get(current)
                .map(|node| node.alternatives.as_slice())
                .unwrap_or_default();
            let incoming = inbound.get(&current).map(Vec::as_slice).unwrap_or_default();
            for &next in outbound.iter().chain(incoming) {
                if self.arena.contains(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        seen.remove(&id);
        trace!("{} has {} alternative(s)", id, seen.len());
        Ok(seen)
    }

    /// Lazy pre-order traversal of the subtree rooted at `id`.
    pub fn walk(&self, id: NodeId) -> DomainResult<Walk<'_>> {
        self.arena.get(id)?;
        Ok(Walk {
            arena: &self.arena,
            stack: vec![id],
        })
    }

    /// Ancestor chain from the root down to `id`, inclusive.
    ///
    /// Fails with `Empty` when the topmost ancestor is outside the root class,
    /// i.e. the node sits in a detached subtree.
    #[instrument(level = "trace", skip(self))]
    pub fn path_from_root(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        let mut path = vec![id];
        let mut current = self.arena.get(id)?.parent;
        while let Some(parent) = current {
            path.push(parent);
            current = self.arena.get(parent)?.parent;
        }

        let top = *path.last().ok_or(DomainError::Empty)?;
        let (_, class) = self.root_class()?;
        if !class.contains(&top) {
            return Err(DomainError::Empty);
        }
        path.reverse();
        Ok(path)
    }

    /// First child of `parent` whose value equals `value`.
    pub fn find_child(&self, parent: NodeId, value: &str) -> DomainResult<Option<NodeId>> {
        let node = self.arena.get(parent)?;
        Ok(node
            .children
            .iter()
            .copied()
            .find(|&child| self.arena.get(child).is_ok_and(|c| c.value == value)))
    }

    /// Child with `value` under `parent`, falling back to the children of
    /// `parent`'s alternatives in ascending id order.
    pub fn find_child_in_class(&self, parent: NodeId, value: &str) -> DomainResult<Option<NodeId>> {
        if let Some(child) = self.find_child(parent, value)? {
            return Ok(Some(child));
        }
        for alternative in self.resolve_alternatives(parent)? {
            if let Some(child) = self.find_child(alternative, value)? {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Resolves path segments below the root.
    ///
    /// At each step the children of the current node are searched first, then
    /// the children of its alternatives.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve_path(&self, segments: &[&str]) -> DomainResult<NodeId> {
        let mut current = self.root()?;
        for (depth, segment) in segments.iter().enumerate() {
            current = self.find_child_in_class(current, segment)?.ok_or_else(|| {
                DomainError::PathNotFound(format!("/{}", segments[..=depth].join("/")))
            })?;
        }
        Ok(current)
    }

    /// Resolves a `/`-separated path; empty segments are ignored.
    pub fn resolve_str(&self, path: &str) -> DomainResult<NodeId> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.resolve_path(&segments)
    }

    /// `/`-joined values below the root, e.g. `/units/tank.json`.
    pub fn relative_path(&self, id: NodeId) -> DomainResult<String> {
        let path = self.path_from_root(id)?;
        let joined = path
            .iter()
            .skip(1)
            .map(|&node_id| self.arena.get(node_id).map(|n| n.value.as_str()))
            .collect::<DomainResult<Vec<_>>>()?
            .iter()
            .join("/");
        Ok(format!("/{}", joined))
    }

    /// Leaf nodes of the subtree rooted at `id`, in pre-order.
    pub fn leaves(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        Ok(self
            .walk(id)?
            .filter(|node| node.is_leaf())
            .map(|node| node.id)
            .collect())
    }

    /// Number of levels below and including the root; 0 for an empty tree.
    pub fn depth(&self) -> usize {
        let Ok(root) = self.root() else {
            return 0;
        };
        let mut max_depth = 0;
        let mut stack = vec![(root, 1)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Ok(node) = self.arena.get(id) {
                stack.extend(node.children.iter().map(|&c| (c, depth + 1)));
            }
        }
        debug!("tree depth: {}", max_depth);
        max_depth
    }
}

/// Pre-order iterator produced by [`ArenaTree::walk`].
pub struct Walk<'a> {
    arena: &'a NodeArena,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Ok(node) = self.arena.get(current) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev().copied());
                return Some(node);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (ArenaTree, NodeId, NodeId, NodeId) {
        let mut tree = ArenaTree::new();
        let arena = tree.arena_mut();
        let a = arena.allocate("src").unwrap();
        let b = arena.allocate("lib").unwrap();
        let c = arena.allocate("types.ts").unwrap();
        arena.attach_child(a, b).unwrap();
        arena.attach_child(b, c).unwrap();
        (tree, a, b, c)
    }

    #[test]
    fn test_root_of_empty_tree() {
        assert_eq!(ArenaTree::new().root(), Err(DomainError::Empty));
        assert_eq!(ArenaTree::new().depth(), 0);
    }

    #[test]
    fn test_root_with_detached_subtree_is_ambiguous() {
        let (mut tree, a, b, c) = chain();
        tree.arena_mut().detach_child(b, c).unwrap();
        assert_eq!(tree.root(), Err(DomainError::MultipleRoots(vec![a, c])));
    }

    #[test]
    fn test_path_from_root_in_detached_subtree_is_empty() {
        let (mut tree, a, b, c) = chain();
        tree.arena_mut().detach_child(a, b).unwrap();
        assert_eq!(tree.path_from_root(c), Err(DomainError::Empty));
        assert_eq!(tree.path_from_root(a), Ok(vec![a]));
    }

    #[test]
    fn test_relative_path_skips_root() {
        let (tree, a, _, c) = chain();
        assert_eq!(tree.relative_path(c).unwrap(), "/lib/types.ts");
        assert_eq!(tree.relative_path(a).unwrap(), "/");
    }

    #[test]
    fn test_resolve_path_and_missing_segment() {
        let (tree, _, _, c) = chain();
        assert_eq!(tree.resolve_path(&["lib", "types.ts"]), Ok(c));
        assert_eq!(tree.resolve_str("/lib/types.ts"), Ok(c));
        assert_eq!(
            tree.resolve_path(&["lib", "nope.ts"]),
            Err(DomainError::PathNotFound("/lib/nope.ts".into()))
        );
    }

    #[test]
    fn test_resolve_path_falls_back_to_alternatives() {
        let (mut tree, a, b, _) = chain();
        let arena = tree.arena_mut();
        let b2 = arena.allocate("lib").unwrap();
        let extra = arena.allocate("extra.ts").unwrap();
        arena.attach_child(a, b2).unwrap();
        arena.attach_child(b2, extra).unwrap();
        arena.add_alternative(b, b2).unwrap();

        assert_eq!(tree.resolve_path(&["lib", "extra.ts"]), Ok(extra));
    }

    #[test]
    fn test_leaves_and_depth() {
        let (mut tree, a, b, c) = chain();
        let d = tree.arena_mut().allocate("mod.rs").unwrap();
        tree.arena_mut().attach_child(a, d).unwrap();
        assert_eq!(tree.leaves(a).unwrap(), vec![c, d]);
        assert_eq!(tree.leaves(b).unwrap(), vec![c]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_unrelated_parentless_alternatives_are_not_one_root() {
        let mut tree = ArenaTree::new();
        let arena = tree.arena_mut();
        let a = arena.allocate("a").unwrap();
        let x = arena.allocate("x").unwrap();
        let y = arena.allocate("y").unwrap();
        arena.attach_child(x, y).unwrap();
        arena.add_alternative(a, x).unwrap();

        assert_eq!(tree.root(), Err(DomainError::MultipleRoots(vec![a, x])));
        assert_eq!(tree.path_from_root(y), Err(DomainError::Empty));
    }

    #[test]
    fn test_same_checksum_parentless_alternatives_share_the_root() {
        let (mut tree, a, _, c) = chain();
        let arena = tree.arena_mut();
        let a2 = arena.allocate("src").unwrap();
        let c2 = arena.allocate("types.ts").unwrap();
        arena.attach_child(a2, c2).unwrap();
        arena.add_alternative(a, a2).unwrap();

        assert_eq!(tree.root(), Ok(a));
        assert_eq!(tree.path_from_root(c2), Ok(vec![a2, c2]));
        assert_eq!(tree.path_from_root(c).unwrap()[0], a);
    }

    #[test]
    fn test_index_is_rebuilt_after_mutation() {
        let (mut tree, a, b, _) = chain();
        assert!(tree.resolve_alternatives(b).unwrap().is_empty());

        let b2 = tree.arena_mut().allocate("lib").unwrap();
        tree.arena_mut().add_alternative(b2, b).unwrap();
        assert_eq!(tree.resolve_alternatives(b).unwrap(), BTreeSet::from([b2]));

        assert_eq!(tree.root(), Err(DomainError::MultipleRoots(vec![a, b2])));
    }

    #[test]
    fn test_walk_is_restartable() {
        let (tree, a, _, _) = chain();
        let first: Vec<NodeId> = tree.walk(a).unwrap().map(|n| n.id).collect();
        let second: Vec<NodeId> = tree.walk(a).unwrap().map(|n| n.id).collect();
        assert_eq!(first, second);
    }
}
