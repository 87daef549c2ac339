//! Tree builder: turns repository shapes into arena trees.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::arena::NodeId;
use crate::domain::checksum::{ChecksumService, Sha256Checksum};
use crate::domain::entities::{DirectoryImage, RepositoryTree};
use crate::domain::error::DomainError;
use crate::domain::tree::ArenaTree;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, DomainError>;

/// Constructs arena trees from segment streams, repository trees and
/// directory images.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    checksum: Arc<dyn ChecksumService>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::with_checksum(Arc::new(Sha256Checksum))
    }

    pub fn with_checksum(checksum: Arc<dyn ChecksumService>) -> Self {
        Self { checksum }
    }

    fn empty_tree(&self) -> ArenaTree {
        ArenaTree::with_checksum(Arc::clone(&self.checksum))
    }

    /// Builds a tree from `(parent_path, segment)` pairs.
    ///
    /// Pairs must arrive parent-before-child. A pair without parent path is the
    /// root; the path of any other node is `<parent_path>/<segment>`. A pair
    /// whose path already exists reuses the existing node.
    #[instrument(level = "debug", skip_all)]
    pub fn build_from_segments<I, P, S>(&self, pairs: I) -> TreeResult<ArenaTree>
    where
        I: IntoIterator<Item = (Option<P>, S)>,
        P: AsRef<str>,
        S: Into<String>,
    {
        let mut tree = self.empty_tree();
        let mut by_path: HashMap<String, NodeId> = HashMap::new();
        let mut root: Option<NodeId> = None;

        for (parent_path, segment) in pairs {
            let segment = segment.into();
            match parent_path {
                None => {
                    if let Some(existing) = root {
                        if by_path.contains_key(&segment) {
                            continue;
                        }
                        return Err(DomainError::MultipleRoots(vec![existing]));
                    }
                    let id = tree.arena_mut().allocate(segment.clone())?;
                    by_path.insert(segment, id);
                    root = Some(id);
                }
                Some(parent_path) => {
                    let parent_path = parent_path.as_ref();
                    let path = format!("{}/{}", parent_path, segment);
                    if by_path.contains_key(&path) {
                        continue;
                    }
                    let parent = *by_path
                        .get(parent_path)
                        .ok_or_else(|| DomainError::UnknownParentPath(parent_path.to_string()))?;
                    let id = tree.arena_mut().allocate(segment)?;
                    tree.arena_mut().attach_child(parent, id)?;
                    by_path.insert(path, id);
                }
            }
        }

        debug!("built tree with {} nodes from segments", tree.len());
        Ok(tree)
    }

    /// One node per repository entry; the node value is the entry's last path
    /// component.
    #[instrument(level = "debug", skip_all)]
    pub fn build_from_repository_tree(&self, repository: &RepositoryTree) -> TreeResult<ArenaTree> {
        let mut keys: HashMap<_, String> = HashMap::new();
        let mut pairs: Vec<(Option<String>, String)> = Vec::with_capacity(repository.len());

        for entry in &repository.entries {
            let segment = last_segment(&entry.path).to_string();
            let parent_key = match entry.parent {
                Some(parent) => Some(
                    keys.get(&parent)
                        .cloned()
                        .ok_or_else(|| DomainError::UnknownParentPath(entry.path.clone()))?,
                ),
                None => None,
            };
            let key = match &parent_key {
                Some(parent_key) => format!("{}/{}", parent_key, segment),
                None => segment.clone(),
            };
            keys.insert(entry.id, key);
            pairs.push((parent_key, segment));
        }

        self.build_from_segments(pairs)
    }

    /// Root value is the image name; shared path prefixes share nodes.
    #[instrument(level = "debug", skip_all, fields(image = %image.name))]
    pub fn build_from_image(&self, image: &DirectoryImage) -> TreeResult<ArenaTree> {
        let mut tree = self.empty_tree();
        let root = tree.arena_mut().allocate(image.name.clone())?;
        for file in &image.files {
            insert_segments(&mut tree, root, &split_segments(file))?;
        }
        debug!("built tree with {} nodes from {} files", tree.len(), image.files.len());
        Ok(tree)
    }

    /// Adds `image` as a parallel subtree whose root is an alternative of the
    /// tree root.
    ///
    /// Every new node that has a same-valued counterpart at the same position
    /// in the existing tree (or in previously merged images) is linked to it as
    /// an alternative. Returns the id of the image root.
    #[instrument(level = "debug", skip_all, fields(image = %image.name))]
    pub fn merge_image(&self, tree: &mut ArenaTree, image: &DirectoryImage) -> TreeResult<NodeId> {
        let primary_root = tree.root()?;
        let root_value = tree.get(primary_root)?.value.clone();
        let image_root = tree.arena_mut().allocate(root_value)?;
        tree.arena_mut().add_alternative(primary_root, image_root)?;

        for file in &image.files {
            let mut current = image_root;
            let mut counterpart = Some(primary_root);
            for segment in split_segments(file) {
                let next_counterpart = match counterpart {
                    Some(position) => tree.find_child_in_class(position, segment)?,
                    None => None,
                };
                current = match tree.find_child(current, segment)? {
                    Some(existing) => existing,
                    None => {
                        let child = tree.arena_mut().allocate(segment)?;
                        tree.arena_mut().attach_child(current, child)?;
                        if let Some(peer) = next_counterpart {
                            tree.arena_mut().add_alternative(peer, child)?;
                        }
                        child
                    }
                };
                counterpart = next_counterpart;
            }
        }

        debug!("merged image under {}", image_root);
        Ok(image_root)
    }

    /// Merges several images under one root name.
    pub fn build_merged(&self, name: &str, images: &[DirectoryImage]) -> TreeResult<ArenaTree> {
        let (first, rest) = images.split_first().ok_or(DomainError::Empty)?;
        let mut tree = self.build_from_image(&DirectoryImage::new(name, first.files.clone()))?;
        for image in rest {
            self.merge_image(&mut tree, image)?;
        }
        Ok(tree)
    }
}

/// Non-empty path segments of a `/` or `\` separated path.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

/// Scanned entry paths are already `/`-separated, so `\` stays part of a name.
fn last_segment(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

fn insert_segments(tree: &mut ArenaTree, root: NodeId, segments: &[&str]) -> TreeResult<NodeId> {
    let mut current = root;
    for segment in segments {
        current = match tree.find_child(current, segment)? {
            Some(child) => child,
            None => {
                let child = tree.arena_mut().allocate(*segment)?;
                tree.arena_mut().attach_child(current, child)?;
                child
            }
        };
    }
    Ok(current)
}
