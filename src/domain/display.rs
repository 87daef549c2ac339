//! Rendering of arena trees as `termtree` trees.

use itertools::Itertools;
use termtree::Tree;

use crate::domain::arena::NodeId;
use crate::domain::entities::{EntryId, RepositoryTree};
use crate::domain::tree::ArenaTree;

pub trait TreeDisplay {
    fn to_tree_string(&self) -> Tree<String>;
}

/// Arena tree rendering with optional alternative annotations.
pub struct ArenaTreeView<'a> {
    tree: &'a ArenaTree,
    show_alternatives: bool,
}

impl<'a> ArenaTreeView<'a> {
    pub fn new(tree: &'a ArenaTree) -> Self {
        Self {
            tree,
            show_alternatives: false,
        }
    }

    pub fn with_alternatives(mut self, show: bool) -> Self {
        self.show_alternatives = show;
        self
    }

    fn label(&self, id: NodeId) -> String {
        let Ok(node) = self.tree.get(id) else {
            return id.to_string();
        };
        if !self.show_alternatives || node.alternatives.is_empty() {
            return node.value.clone();
        }
        format!(
            "{} {} [alt: {}]",
            node.value,
            id,
            node.alternatives.iter().join(", ")
        )
    }

    /// Renders the subtree below `id`, e.g. an alternative root.
    pub fn subtree(&self, id: NodeId) -> Tree<String> {
        self.build(id)
    }

    fn build(&self, id: NodeId) -> Tree<String> {
        let mut tree = Tree::new(self.label(id));
        if let Ok(node) = self.tree.get(id) {
            for &child in &node.children {
                tree.push(self.build(child));
            }
        }
        tree
    }
}

impl TreeDisplay for ArenaTreeView<'_> {
    fn to_tree_string(&self) -> Tree<String> {
        match self.tree.root() {
            Ok(root) => self.build(root),
            Err(_) => Tree::new("Empty tree".to_string()),
        }
    }
}

impl TreeDisplay for ArenaTree {
    fn to_tree_string(&self) -> Tree<String> {
        ArenaTreeView::new(self).to_tree_string()
    }
}

impl TreeDisplay for RepositoryTree {
    fn to_tree_string(&self) -> Tree<String> {
        let Some(root) = self.entries.iter().find(|e| e.parent.is_none()) else {
            return Tree::new("Empty tree".to_string());
        };

        fn build(repo: &RepositoryTree, entry_id: EntryId) -> Tree<String> {
            let label = repo
                .get(entry_id)
                .map(|e| e.path.clone())
                .unwrap_or_default();
            let mut tree = Tree::new(label);
            if let Some(entry) = repo.get(entry_id) {
                for &child in &entry.children {
                    tree.push(build(repo, child));
                }
            }
            tree
        }

        build(self, root.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_alternatives() {
        let mut tree = ArenaTree::new();
        let arena = tree.arena_mut();
        let root = arena.allocate("mod").unwrap();
        let a = arena.allocate("units").unwrap();
        let b = arena.allocate("units").unwrap();
        arena.attach_child(root, a).unwrap();
        arena.attach_child(root, b).unwrap();
        arena.add_alternative(a, b).unwrap();

        let plain = tree.to_tree_string().to_string();
        assert!(plain.starts_with("mod"));
        assert!(!plain.contains("alt:"));

        let annotated = ArenaTreeView::new(&tree)
            .with_alternatives(true)
            .to_tree_string()
            .to_string();
        assert!(annotated.contains("units #1 [alt: #2]"));
    }

    #[test]
    fn test_render_empty_tree() {
        assert_eq!(
            ArenaTree::new().to_tree_string().to_string().trim(),
            "Empty tree"
        );
    }
}
