//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Arena trees of project folders: alternatives from directory images, reference checks for JSON
#[derive(Parser, Debug)]
#[command(name = "repotree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the project as a tree
    Tree {
        /// Project directory
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
        /// Annotate nodes with their alternatives
        #[arg(short, long)]
        alternatives: bool,
    },

    /// Resolve a project-relative path to a node
    Resolve {
        /// Path such as /units/tank.json
        path: String,
    },

    /// Check JSON files for broken path references
    Analyze {
        /// Project directory
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Take, list and merge directory images
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },

    /// Register, unregister and discover repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// Save and verify arena snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImageCommands {
    /// List every file below a directory
    Take {
        /// Directory to image
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        /// Store the image in the images directory
        #[arg(long)]
        save: bool,
        /// File stem in the images directory (default: image name)
        #[arg(long = "as", requires = "save")]
        stem: Option<String>,
    },

    /// List stored images
    List,

    /// Merge all stored images with the same name into one tree
    Merge {
        /// Image name
        name: String,
        /// Annotate nodes with their alternatives
        #[arg(short, long)]
        alternatives: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// Register a folder holding the marker file
    Add {
        /// Repository folder
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
    },

    /// Unregister a folder
    Remove {
        /// Repository folder
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
    },

    /// List registered repositories with their identifiers
    List,

    /// Find folders holding the marker file
    Find {
        /// Folder to search (default: cwd)
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Write the project's arena tree as JSON
    Save {
        /// Project directory
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
        /// Output file
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },

    /// Load a snapshot and check every invariant
    Verify {
        /// Snapshot file
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Show config file locations
    Path,
}
