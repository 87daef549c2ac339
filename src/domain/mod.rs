//! Domain layer: node arena, arena tree and repository shapes
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod checksum;
pub mod display;
pub mod entities;
pub mod error;
pub mod shared;
pub mod tree;

pub use arena::{ArenaSnapshot, Node, NodeArena, NodeId};
pub use builder::{split_segments, TreeBuilder};
pub use checksum::{Checksum, ChecksumService, Sha256Checksum};
pub use display::{ArenaTreeView, TreeDisplay};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use shared::SharedArenaTree;
pub use tree::{ArenaTree, Walk};
