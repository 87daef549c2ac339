//! Arena snapshot persistence
//!
//! Snapshots are JSON: `{ "next_id": n, "nodes": { "<id>": Node } }`.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::{ApplicationResult, IoResultExt, JsonResultExt};
use crate::domain::{ArenaSnapshot, ArenaTree, ChecksumService};
use crate::infrastructure::traits::FileSystem;

/// Saves and loads arena trees.
pub struct SnapshotService {
    fs: Arc<dyn FileSystem>,
    checksum: Arc<dyn ChecksumService>,
}

impl SnapshotService {
    pub fn new(fs: Arc<dyn FileSystem>, checksum: Arc<dyn ChecksumService>) -> Self {
        Self { fs, checksum }
    }

    #[instrument(level = "debug", skip(self, tree))]
    pub fn save(&self, tree: &ArenaTree, path: &Path) -> ApplicationResult<()> {
        let json = serde_json::to_string_pretty(&tree.arena().snapshot())
            .with_path_context("serialize snapshot", path)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create snapshot dir", path)?;
        self.fs
            .write_atomic(path, &json)
            .with_path_context("write snapshot", path)?;
        info!("saved snapshot of {} nodes to {}", tree.len(), path.display());
        Ok(())
    }

    /// Loads a snapshot, re-checking every arena invariant and checksum.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<ArenaTree> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read snapshot", path)?;
        let snapshot: ArenaSnapshot =
            serde_json::from_str(&content).with_path_context("parse snapshot", path)?;
        Ok(ArenaTree::from_snapshot(snapshot, Arc::clone(&self.checksum))?)
    }
}
