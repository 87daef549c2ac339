//! Command dispatch
//!
//! Each handler loads settings, wires services through the container and
//! prints results via [`crate::cli::output`].

use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::Project;
use crate::cli::args::{
    Cli, Commands, ConfigCommands, ImageCommands, RepoCommands, SnapshotCommands,
};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, project_config_path, Settings};
use crate::domain::{ArenaTree, ArenaTreeView, TreeDisplay};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Tree { dir, alternatives }) => cmd_tree(cli, dir.as_deref(), *alternatives),
        Some(Commands::Resolve { path }) => cmd_resolve(cli, path),
        Some(Commands::Analyze { dir, json }) => cmd_analyze(cli, dir.as_deref(), *json),
        Some(Commands::Image { command }) => match command {
            ImageCommands::Take { dir, save, stem } => {
                cmd_image_take(cli, dir, *save, stem.as_deref())
            }
            ImageCommands::List => cmd_image_list(cli),
            ImageCommands::Merge { name, alternatives } => {
                cmd_image_merge(cli, name, *alternatives)
            }
        },
        Some(Commands::Repo { command }) => match command {
            RepoCommands::Add { dir } => cmd_repo_add(cli, dir),
            RepoCommands::Remove { dir } => cmd_repo_remove(cli, dir),
            RepoCommands::List => cmd_repo_list(cli),
            RepoCommands::Find { dir } => cmd_repo_find(cli, dir.as_deref()),
        },
        Some(Commands::Snapshot { command }) => match command {
            SnapshotCommands::Save { dir, output } => cmd_snapshot_save(cli, dir.as_deref(), output),
            SnapshotCommands::Verify { file } => cmd_snapshot_verify(cli, file),
        },
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => cmd_config_show(cli),
            ConfigCommands::Path => cmd_config_path(cli),
        },
        Some(Commands::Completion { shell }) => cmd_completion(*shell),
        None => Err(CliError::Usage(
            "no command given, see `repotree --help`".to_string(),
        )),
    }
}

/// Explicit positional dir, then `-C`, then the current directory.
fn project_dir(cli: &Cli, dir: Option<&Path>) -> CliResult<PathBuf> {
    match dir.or(cli.project_dir.as_deref()) {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("determine current directory", e).into()),
    }
}

/// Registry entries are absolute; existing folders are canonicalized.
fn absolute_dir(dir: &Path) -> CliResult<PathBuf> {
    if let Ok(canonical) = dir.canonicalize() {
        return Ok(canonical);
    }
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .map_err(|e| InfraError::io("determine current directory", e).into())
}

fn container(project_dir: Option<&Path>) -> CliResult<ServiceContainer> {
    let settings = Settings::load(project_dir)?;
    debug!("settings: {:?}", settings);
    Ok(ServiceContainer::new(settings))
}

fn open_project(cli: &Cli, dir: Option<&Path>) -> CliResult<(ServiceContainer, Project)> {
    let dir = project_dir(cli, dir)?;
    let container = container(Some(&dir))?;
    let project = container.project_service().open(&dir)?;
    Ok((container, project))
}

fn print_tree(tree: &ArenaTree, alternatives: bool) -> CliResult<()> {
    let view = ArenaTreeView::new(tree).with_alternatives(alternatives);
    output::info(&view.to_tree_string());
    if alternatives {
        let root = tree.root()?;
        for alt_root in tree.resolve_alternatives(root)? {
            output::info(&view.subtree(alt_root));
        }
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_tree(cli: &Cli, dir: Option<&Path>, alternatives: bool) -> CliResult<()> {
    let (_, project) = open_project(cli, dir)?;
    print_tree(&project.tree, alternatives)
}

#[instrument(skip(cli))]
fn cmd_resolve(cli: &Cli, path: &str) -> CliResult<()> {
    let (_, project) = open_project(cli, None)?;
    let id = project.find_by_relative_path(path)?;
    let node = project.tree.get(id)?;

    output::action("node", &id);
    output::action("value", &node.value);
    output::action("checksum", &node.checksum);
    output::action("path", &project.absolute_path(id)?.display());
    let alternatives = project.tree.resolve_alternatives(id)?;
    if !alternatives.is_empty() {
        output::action("alternatives", &alternatives.iter().join(", "));
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_analyze(cli: &Cli, dir: Option<&Path>, json: bool) -> CliResult<()> {
    let (container, project) = open_project(cli, dir)?;
    let results = container.analyzer().analyze(&project)?;

    if json {
        let rendered = serde_json::to_string_pretty(&results)
            .map_err(|e| InfraError::serialization("render analysis results", e))?;
        output::info(&rendered);
        return Ok(());
    }

    let mut tip_count = 0;
    for result in results.iter().filter(|r| !r.is_clean()) {
        output::header(&result.file_path);
        for tip in &result.tips {
            output::failure(&format!(
                "{} = {:?}: {}",
                tip.property_name, tip.property_value, tip.message
            ));
            tip_count += 1;
        }
    }
    output::success(&format!(
        "analyzed {} files, {} tips",
        results.len(),
        tip_count
    ));
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_image_take(cli: &Cli, dir: &Path, save: bool, stem: Option<&str>) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let images = container.image_service();
    let image = images.take(dir)?;

    if save {
        let path = images.save(&image, stem)?;
        output::success(&format!(
            "saved image {} ({} files) to {}",
            image.name,
            image.files.len(),
            path.display()
        ));
    } else {
        output::header(&image.name);
        for file in &image.files {
            output::detail(file);
        }
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_image_list(cli: &Cli) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let images = container.image_service();
    output::action("images dir", &images.images_dir().display());
    for image in images.load_all()? {
        output::detail(&format!("{} ({} files)", image.name, image.files.len()));
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_image_merge(cli: &Cli, name: &str, alternatives: bool) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let tree = container.image_service().merge(name)?;
    print_tree(&tree, alternatives)
}

#[instrument(skip(cli))]
fn cmd_repo_add(cli: &Cli, dir: &Path) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let repository = container.repository_service().add(&absolute_dir(dir)?)?;
    output::success(&format!("registered {}", repository.folder_path.display()));
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_repo_remove(cli: &Cli, dir: &Path) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let dir = absolute_dir(dir)?;
    if container.repository_service().remove(&dir)? {
        output::success(&format!("unregistered {}", dir.display()));
    } else {
        output::info(&format!("not registered: {}", dir.display()));
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_repo_list(cli: &Cli) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let repositories = container.repository_service();
    output::action("registry", &repositories.registry_file().display());
    for info in repositories.infos()? {
        output::detail(&format!(
            "{} ({})",
            info.folder_path.display(),
            info.mod_identifier.as_deref().unwrap_or("no identifier")
        ));
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_repo_find(cli: &Cli, dir: Option<&Path>) -> CliResult<()> {
    let root = project_dir(cli, dir)?;
    let container = container(Some(&root))?;
    for repository in container.repository_service().find(&root)? {
        output::detail(&repository.folder_path.display());
    }
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_snapshot_save(cli: &Cli, dir: Option<&Path>, out: &Path) -> CliResult<()> {
    let (container, project) = open_project(cli, dir)?;
    container.snapshot_service().save(&project.tree, out)?;
    output::success(&format!(
        "saved {} nodes to {}",
        project.tree.len(),
        out.display()
    ));
    Ok(())
}

#[instrument(skip(cli))]
fn cmd_snapshot_verify(cli: &Cli, file: &Path) -> CliResult<()> {
    let container = container(cli.project_dir.as_deref())?;
    let tree = container.snapshot_service().load(file)?;
    let root = tree.root()?;
    output::success(&format!(
        "{}: {} nodes, root {}, depth {}",
        file.display(),
        tree.len(),
        root,
        tree.depth()
    ));
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> CliResult<()> {
    let settings = Settings::load(cli.project_dir.as_deref())?;
    output::info(&settings.to_toml()?);
    Ok(())
}

fn cmd_config_path(cli: &Cli) -> CliResult<()> {
    match global_config_path() {
        Some(path) => output::action("global", &path.display()),
        None => output::action("global", &"(no config directory)"),
    }
    let dir = project_dir(cli, None)?;
    output::action("project", &project_config_path(&dir).display());
    Ok(())
}

fn cmd_completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
