//! Directory image store
//!
//! Images are kept as `<images_dir>/<stem>.json`, the stem defaulting to the
//! image name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, JsonResultExt};
use crate::domain::{ArenaTree, ChecksumService, DirectoryImage, TreeBuilder};
use crate::infrastructure::traits::{DirectoryScanner, FileSystem};

/// Service for taking, storing and merging directory images.
pub struct ImageService {
    fs: Arc<dyn FileSystem>,
    scanner: Arc<dyn DirectoryScanner>,
    checksum: Arc<dyn ChecksumService>,
    images_dir: PathBuf,
}

impl ImageService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        scanner: Arc<dyn DirectoryScanner>,
        checksum: Arc<dyn ChecksumService>,
        images_dir: PathBuf,
    ) -> Self {
        Self {
            fs,
            scanner,
            checksum,
            images_dir,
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Lists every file under `dir`; the image is named after the folder.
    #[instrument(level = "debug", skip(self))]
    pub fn take(&self, dir: &Path) -> ApplicationResult<DirectoryImage> {
        self.scanner
            .directory_image(dir)
            .with_path_context("take directory image", dir)
    }

    /// Writes `image` to `<images_dir>/<stem>.json`, replacing any file there.
    ///
    /// The stem defaults to the image name; pass a different one to keep
    /// several images of the same folder side by side.
    pub fn save(&self, image: &DirectoryImage, stem: Option<&str>) -> ApplicationResult<PathBuf> {
        let stem = stem.unwrap_or(image.name.as_str());
        let path = self.images_dir.join(format!("{}.json", stem));
        let json = serde_json::to_string_pretty(image).with_path_context("serialize image", &path)?;

        self.fs
            .create_dir_all(&self.images_dir)
            .with_path_context("create images dir", &self.images_dir)?;
        self.fs
            .write_atomic(&path, &json)
            .with_path_context("write image", &path)?;

        info!("saved image {} ({} files)", image.name, image.files.len());
        Ok(path)
    }

    /// Every `*.json` image in the store, in file-name order.
    ///
    /// A missing store yields no images.
    pub fn load_all(&self) -> ApplicationResult<Vec<DirectoryImage>> {
        if !self.fs.is_dir(&self.images_dir) {
            debug!("no images dir at {}", self.images_dir.display());
            return Ok(Vec::new());
        }

        let entries = self
            .fs
            .list_dir(&self.images_dir)
            .with_path_context("list images", &self.images_dir)?;

        entries
            .iter()
            .filter(|p| self.fs.is_file(p) && p.extension().is_some_and(|ext| ext == "json"))
            .map(|path| {
                let content = self
                    .fs
                    .read_to_string(path)
                    .with_path_context("read image", path)?;
                serde_json::from_str::<DirectoryImage>(&content)
                    .with_path_context("parse image", path)
            })
            .collect()
    }

    /// Merges all stored images named `name` into one tree.
    ///
    /// The first image forms the primary subtree; every further image becomes
    /// an alternative subtree of the root.
    #[instrument(level = "debug", skip(self))]
    pub fn merge(&self, name: &str) -> ApplicationResult<ArenaTree> {
        let images: Vec<DirectoryImage> = self
            .load_all()?
            .into_iter()
            .filter(|image| image.name == name)
            .collect();
        if images.is_empty() {
            return Err(ApplicationError::ImageNotFound(name.to_string()));
        }

        let tree = TreeBuilder::with_checksum(Arc::clone(&self.checksum)).build_merged(name, &images)?;
        debug!("merged {} images into {} nodes", images.len(), tree.len());
        Ok(tree)
    }
}
