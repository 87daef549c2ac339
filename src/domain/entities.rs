//! Domain entities: repository shapes and analysis output

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Flat description of a directory: its name and every file below it as a
/// `/`-separated relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryImage {
    pub name: String,
    pub files: Vec<String>,
}

impl DirectoryImage {
    pub fn new(name: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }
}

/// Identity of a repository tree entry (1-based, assigned in insertion order).
#[derive(Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
#[serde(transparent)]
pub struct EntryId(u32);

impl EntryId {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// One directory or file of a scanned repository.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RepositoryTreeEntry {
    pub id: EntryId,
    pub path: String,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
}

/// Filesystem-shaped tree without checksums or alternatives.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RepositoryTree {
    pub entries: Vec<RepositoryTreeEntry>,
    pub last_generated_id: u32,
}

impl RepositoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&mut self) -> EntryId {
        self.last_generated_id += 1;
        EntryId(self.last_generated_id)
    }

    /// Appends an entry and links it into its parent's children.
    pub fn add_entry(&mut self, parent: Option<EntryId>, path: impl Into<String>) -> EntryId {
        let id = self.generate_id();
        if let Some(parent_entry) = parent.and_then(|p| self.get_mut(p)) {
            parent_entry.children.push(id);
        }
        self.entries.push(RepositoryTreeEntry {
            id,
            path: path.into(),
            parent,
            children: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: EntryId) -> Option<&RepositoryTreeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: EntryId) -> Option<&mut RepositoryTreeEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One observation about a property found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub property_name: String,
    pub property_value: String,
    pub message: String,
}

impl Tip {
    pub fn new(
        property_name: impl Into<String>,
        property_value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            property_value: property_value.into(),
            message: message.into(),
        }
    }
}

/// Tips collected for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub file_path: String,
    pub tips: Vec<Tip>,
}

impl AnalysisResult {
    pub fn new(file_path: impl Into<String>, tips: Vec<Tip>) -> DomainResult<Self> {
        let file_path = file_path.into();
        if file_path.is_empty() {
            return Err(DomainError::EmptyFilePath);
        }
        Ok(Self { file_path, tips })
    }

    pub fn is_clean(&self) -> bool {
        self.tips.is_empty()
    }
}

/// A registered repository: a folder holding the marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub folder_path: PathBuf,
}

impl Repository {
    pub fn new(folder_path: impl Into<PathBuf>) -> Self {
        Self {
            folder_path: folder_path.into(),
        }
    }
}

/// A repository plus the `identifier` declared in its marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub folder_path: PathBuf,
    pub mod_identifier: Option<String>,
}
