//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{
    ImageService, JsonAnalyzer, ProjectService, RepositoryService, SnapshotService,
};
use crate::config::Settings;
use crate::domain::{ChecksumService, Sha256Checksum};
use crate::infrastructure::traits::{DirectoryScanner, FileSystem, RealFileSystem, WalkDirScanner};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Directory scanner abstraction
    pub scanner: Arc<dyn DirectoryScanner>,

    /// Checksum used for every tree built by the services
    pub checksum: Arc<dyn ChecksumService>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(WalkDirScanner),
            Arc::new(Sha256Checksum),
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        scanner: Arc<dyn DirectoryScanner>,
        checksum: Arc<dyn ChecksumService>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            scanner,
            checksum,
        }
    }

    pub fn project_service(&self) -> ProjectService {
        ProjectService::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.scanner),
            Arc::clone(&self.checksum),
            &self.settings,
        )
    }

    pub fn analyzer(&self) -> JsonAnalyzer {
        JsonAnalyzer::new(Arc::clone(&self.fs), self.settings.analyzer.clone())
    }

    pub fn image_service(&self) -> ImageService {
        ImageService::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.scanner),
            Arc::clone(&self.checksum),
            self.settings.images_dir.clone(),
        )
    }

    pub fn repository_service(&self) -> RepositoryService {
        RepositoryService::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.scanner),
            &self.settings,
        )
    }

    pub fn snapshot_service(&self) -> SnapshotService {
        SnapshotService::new(Arc::clone(&self.fs), Arc::clone(&self.checksum))
    }
}
