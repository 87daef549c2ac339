//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::domain::{DirectoryImage, EntryId, RepositoryTree};
use crate::util::path::{file_name_of, relative_slash_path, to_slash_path};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write via a temp file in the same directory, then rename into place.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Immediate entries of a directory, sorted by path.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Directory scanning abstraction.
pub trait DirectoryScanner: Send + Sync {
    /// Every file below `root` as a `/`-separated relative path.
    fn directory_image(&self, root: &Path) -> io::Result<DirectoryImage>;

    /// One entry per directory and file below (and including) `root`.
    fn repository_tree(&self, root: &Path) -> io::Result<RepositoryTree>;

    /// `root` and every directory below it, parents first, in file-name order.
    fn directories(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Real scanner implementation using walkdir.
#[derive(Debug, Default)]
pub struct WalkDirScanner;

impl DirectoryScanner for WalkDirScanner {
    #[instrument(level = "debug", skip(self))]
    fn directory_image(&self, root: &Path) -> io::Result<DirectoryImage> {
        let name = file_name_of(root)?;
        let mut files = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(relative_slash_path(root, entry.path())?);
            }
        }

        debug!("imaged {} files under {}", files.len(), root.display());
        Ok(DirectoryImage::new(name, files))
    }

    #[instrument(level = "debug", skip(self))]
    fn repository_tree(&self, root: &Path) -> io::Result<RepositoryTree> {
        let mut tree = RepositoryTree::new();
        // walkdir yields parents before children; depth indexes the open ancestors
        let mut ancestors: Vec<EntryId> = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            let file_type = entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                continue;
            }

            ancestors.truncate(entry.depth());
            let parent = ancestors.last().copied();
            let path = to_slash_path(entry.path());
            let id = tree.add_entry(parent, path);
            if file_type.is_dir() {
                ancestors.push(id);
            }
        }

        debug!("scanned {} entries under {}", tree.len(), root.display());
        Ok(tree)
    }

    #[instrument(level = "debug", skip(self))]
    fn directories(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }
}
