//! Repository registry
//!
//! Registered repository folders are persisted as a JSON array in
//! `repositories.json`. A folder qualifies when it holds the marker file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, JsonResultExt};
use crate::config::Settings;
use crate::domain::{Repository, RepositoryInfo};
use crate::infrastructure::traits::{DirectoryScanner, FileSystem};

/// Service for finding, registering and describing repositories.
pub struct RepositoryService {
    fs: Arc<dyn FileSystem>,
    scanner: Arc<dyn DirectoryScanner>,
    marker_file: String,
    registry_file: PathBuf,
}

impl RepositoryService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        scanner: Arc<dyn DirectoryScanner>,
        settings: &Settings,
    ) -> Self {
        Self {
            fs,
            scanner,
            marker_file: settings.marker_file.clone(),
            registry_file: settings.registry_file.clone(),
        }
    }

    pub fn registry_file(&self) -> &Path {
        &self.registry_file
    }

    pub fn is_repository_folder(&self, folder: &Path) -> bool {
        self.fs.is_file(&folder.join(&self.marker_file))
    }

    /// Every folder at or below `root` that holds the marker file.
    #[instrument(level = "debug", skip(self))]
    pub fn find(&self, root: &Path) -> ApplicationResult<Vec<Repository>> {
        if !self.fs.exists(root) {
            return Err(ApplicationError::FolderNotFound(root.to_path_buf()));
        }
        let found: Vec<Repository> = self
            .scanner
            .directories(root)
            .with_path_context("scan for repositories", root)?
            .into_iter()
            .filter(|dir| self.is_repository_folder(dir))
            .map(Repository::new)
            .collect();
        debug!("found {} repositories under {}", found.len(), root.display());
        Ok(found)
    }

    /// Registered repositories; none when the registry file does not exist yet.
    pub fn list(&self) -> ApplicationResult<Vec<Repository>> {
        if !self.fs.exists(&self.registry_file) {
            return Ok(Vec::new());
        }
        let content = self
            .fs
            .read_to_string(&self.registry_file)
            .with_path_context("read registry", &self.registry_file)?;
        serde_json::from_str(&content).with_path_context("parse registry", &self.registry_file)
    }

    /// Registers `folder`. Registering a folder twice keeps one entry.
    #[instrument(level = "debug", skip(self))]
    pub fn add(&self, folder: &Path) -> ApplicationResult<Repository> {
        if !self.fs.exists(folder) {
            return Err(ApplicationError::FolderNotFound(folder.to_path_buf()));
        }
        if !self.is_repository_folder(folder) {
            return Err(ApplicationError::NotAProject(folder.to_path_buf()));
        }

        let repository = Repository::new(folder);
        let mut repositories = self.list()?;
        if repositories.contains(&repository) {
            debug!("{} already registered", folder.display());
            return Ok(repository);
        }
        repositories.push(repository.clone());
        self.save(&repositories)?;

        info!("registered repository {}", folder.display());
        Ok(repository)
    }

    /// Unregisters `folder`; returns whether it was registered.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, folder: &Path) -> ApplicationResult<bool> {
        let mut repositories = self.list()?;
        let before = repositories.len();
        repositories.retain(|repository| repository.folder_path != folder);
        if repositories.len() == before {
            return Ok(false);
        }
        self.save(&repositories)?;

        info!("unregistered repository {}", folder.display());
        Ok(true)
    }

    /// Registered repositories with the `identifier` read from their marker file.
    ///
    /// A marker that cannot be read or parsed yields no identifier.
    pub fn infos(&self) -> ApplicationResult<Vec<RepositoryInfo>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|repository| {
                let mod_identifier = self.read_identifier(&repository.folder_path);
                RepositoryInfo {
                    folder_path: repository.folder_path,
                    mod_identifier,
                }
            })
            .collect())
    }

    fn read_identifier(&self, folder: &Path) -> Option<String> {
        let marker = folder.join(&self.marker_file);
        let parsed = self
            .fs
            .read_to_string(&marker)
            .with_path_context("read marker", &marker)
            .and_then(|content| {
                serde_json::from_str::<Value>(&content).with_path_context("parse marker", &marker)
            });
        match parsed {
            Ok(value) => value
                .get("identifier")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn save(&self, repositories: &[Repository]) -> ApplicationResult<()> {
        let json = serde_json::to_string_pretty(repositories)
            .with_path_context("serialize registry", &self.registry_file)?;
        self.fs
            .ensure_parent(&self.registry_file)
            .with_path_context("create registry dir", &self.registry_file)?;
        self.fs
            .write_atomic(&self.registry_file, &json)
            .with_path_context("write registry", &self.registry_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::traits::{RealFileSystem, WalkDirScanner};
    use tempfile::TempDir;

    fn service(registry_file: PathBuf) -> RepositoryService {
        let settings = Settings {
            registry_file,
            ..Settings::default()
        };
        RepositoryService::new(Arc::new(RealFileSystem), Arc::new(WalkDirScanner), &settings)
    }

    #[test]
    fn test_list_without_registry_is_empty() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path().join("repositories/repositories.json"));
        assert!(service.list().unwrap().is_empty());
        assert!(!service.registry_file().exists());
    }

    #[test]
    fn test_add_requires_marker_file() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path().join("repositories.json"));

        let err = service.add(temp.path()).unwrap_err();

        assert!(matches!(err, ApplicationError::NotAProject(path) if path == temp.path()));
        assert!(!service.registry_file().exists());
    }

    #[test]
    fn test_add_missing_folder() {
        let temp = TempDir::new().unwrap();
        let service = service(temp.path().join("repositories.json"));
        let missing = temp.path().join("gone");

        let err = service.add(&missing).unwrap_err();

        assert!(matches!(err, ApplicationError::FolderNotFound(path) if path == missing));
    }

    #[test]
    fn test_identifier_from_marker() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("modinfo.json"),
            r#"{"identifier": "com.example.tanks"}"#,
        )
        .unwrap();
        let service = service(temp.path().join("registry/repositories.json"));

        service.add(temp.path()).unwrap();

        assert_eq!(
            service.infos().unwrap(),
            vec![RepositoryInfo {
                folder_path: temp.path().to_path_buf(),
                mod_identifier: Some("com.example.tanks".into()),
            }]
        );
    }
}
