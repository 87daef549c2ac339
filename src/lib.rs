//! repotree: arena-indexed project trees with content-addressed alternatives

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
