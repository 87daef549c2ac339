//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, DirectoryScanner)
//! but are themselves concrete structs, not traits.

mod analyzer;
mod images;
mod project;
mod repositories;
mod snapshot;

pub use analyzer::{JsonAnalyzer, INCORRECT_SLASH, MISSING_LEADING_SLASH};
pub use images::ImageService;
pub use project::{Project, ProjectService};
pub use repositories::RepositoryService;
pub use snapshot::SnapshotService;
