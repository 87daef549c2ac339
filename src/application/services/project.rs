//! Project service
//!
//! A project is a folder holding the marker file; opening one scans the folder
//! into an arena tree whose root value is the folder name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{ArenaTree, ChecksumService, DomainResult, NodeId, TreeBuilder};
use crate::infrastructure::traits::{DirectoryScanner, FileSystem};
use crate::util::path::file_name_of;

/// An opened project folder.
#[derive(Debug)]
pub struct Project {
    pub name: String,
    pub root_dir: PathBuf,
    pub marker_path: PathBuf,
    pub tree: ArenaTree,
}

impl Project {
    /// Project-relative path of a node, e.g. `/units/tank.json`.
    pub fn relative_path(&self, id: NodeId) -> DomainResult<String> {
        self.tree.relative_path(id)
    }

    /// Filesystem path of a node.
    pub fn absolute_path(&self, id: NodeId) -> DomainResult<PathBuf> {
        let relative = self.relative_path(id)?;
        Ok(relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root_dir.clone(), |path, segment| path.join(segment)))
    }

    pub fn find_by_relative_path(&self, path: &str) -> DomainResult<NodeId> {
        self.tree.resolve_str(path)
    }
}

/// Service for detecting and opening project folders.
pub struct ProjectService {
    fs: Arc<dyn FileSystem>,
    scanner: Arc<dyn DirectoryScanner>,
    checksum: Arc<dyn ChecksumService>,
    marker_file: String,
}

impl ProjectService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        scanner: Arc<dyn DirectoryScanner>,
        checksum: Arc<dyn ChecksumService>,
        settings: &Settings,
    ) -> Self {
        Self {
            fs,
            scanner,
            checksum,
            marker_file: settings.marker_file.clone(),
        }
    }

    /// Whether `dir` contains the marker file. Fails when `dir` is not a directory.
    pub fn is_project_folder(&self, dir: &Path) -> ApplicationResult<bool> {
        if !self.fs.is_dir(dir) {
            return Err(ApplicationError::OperationFailed {
                context: format!("not a directory: {}", dir.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "expected a directory",
                )),
            });
        }
        Ok(self.fs.is_file(&dir.join(&self.marker_file)))
    }

    /// Scans a project folder into an arena tree.
    #[instrument(level = "debug", skip(self))]
    pub fn open(&self, dir: &Path) -> ApplicationResult<Project> {
        if !self.is_project_folder(dir)? {
            return Err(ApplicationError::NotAProject(dir.to_path_buf()));
        }

        let repository = self
            .scanner
            .repository_tree(dir)
            .with_path_context("scan project", dir)?;
        let tree = TreeBuilder::with_checksum(Arc::clone(&self.checksum))
            .build_from_repository_tree(&repository)?;
        let name = file_name_of(dir).with_path_context("project name", dir)?;

        debug!("opened project {} with {} nodes", name, tree.len());
        Ok(Project {
            name,
            root_dir: dir.to_path_buf(),
            marker_path: dir.join(&self.marker_file),
            tree,
        })
    }
}
