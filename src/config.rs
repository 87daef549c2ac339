//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/repotree/repotree.toml`
//! 3. Project config: `<project>/.repotree.toml`
//! 4. Environment variables: `REPOTREE_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;

pub const DEFAULT_MARKER_FILE: &str = "modinfo.json";

/// Analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// File extensions to analyze, without the dot
    pub extensions: Vec<String>,
    /// Check that `.json` references resolve in the project tree
    pub check_references: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["json".into()],
            check_references: true,
        }
    }
}

/// Raw analyzer config for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawAnalyzerConfig {
    pub extensions: Option<Vec<String>>,
    pub check_references: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub images_dir: Option<PathBuf>,
    pub registry_file: Option<PathBuf>,
    pub marker_file: Option<String>,
    #[serde(default)]
    pub analyzer: RawAnalyzerConfig,
}

impl AnalyzerConfig {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["json"], &["jsonc"])         // → ["json", "jsonc"]
    /// merge_array(&["json"], &["!json", "pfx"]) // → ["pfx"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Project layer: union merge for arrays, overlay wins for scalars.
    pub fn merge(&self, overlay: &RawAnalyzerConfig) -> Self {
        Self {
            extensions: overlay
                .extensions
                .as_ref()
                .map(|o| Self::merge_array(&self.extensions, o))
                .unwrap_or_else(|| self.extensions.clone()),
            check_references: overlay.check_references.unwrap_or(self.check_references),
        }
    }

    /// Global layer: arrays replace the defaults.
    pub fn apply_global(&self, global: &RawAnalyzerConfig) -> Self {
        Self {
            extensions: global
                .extensions
                .clone()
                .unwrap_or_else(|| self.extensions.clone()),
            check_references: global.check_references.unwrap_or(self.check_references),
        }
    }

    /// Whether `path` has one of the configured extensions (case-insensitive).
    pub fn matches(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext.to_ascii_lowercase())))
    }
}

/// Unified configuration for repotree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory holding saved directory images (`<name>.json`)
    pub images_dir: PathBuf,
    /// Registered repositories (`repositories.json`)
    pub registry_file: PathBuf,
    /// File whose presence marks a project folder
    pub marker_file: String,
    /// JSON analyzer settings
    pub analyzer: AnalyzerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            images_dir: default_data_path("images"),
            registry_file: default_data_path("repositories/repositories.json"),
            marker_file: DEFAULT_MARKER_FILE.into(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

fn default_data_path(relative: &str) -> PathBuf {
    ProjectDirs::from("", "", "repotree")
        .map(|dirs| dirs.data_dir().join(relative))
        .unwrap_or_else(|| PathBuf::from("~/.repotree").join(relative))
}

/// Get the XDG config directory for repotree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repotree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("repotree.toml"))
}

/// Get the path to the project-local config file.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".repotree.toml")
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables are left as written.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(raw.as_ref()) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref()),
    }
}

impl Settings {
    fn expand_paths(&mut self) {
        self.images_dir = expand_path(&self.images_dir);
        self.registry_file = expand_path(&self.registry_file);
    }

    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            images_dir: overlay
                .images_dir
                .clone()
                .unwrap_or_else(|| self.images_dir.clone()),
            registry_file: overlay
                .registry_file
                .clone()
                .unwrap_or_else(|| self.registry_file.clone()),
            marker_file: overlay
                .marker_file
                .clone()
                .unwrap_or_else(|| self.marker_file.clone()),
            analyzer: self.analyzer.merge(&overlay.analyzer),
        }
    }

    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            images_dir: global
                .images_dir
                .clone()
                .unwrap_or_else(|| self.images_dir.clone()),
            registry_file: global
                .registry_file
                .clone()
                .unwrap_or_else(|| self.registry_file.clone()),
            marker_file: global
                .marker_file
                .clone()
                .unwrap_or_else(|| self.marker_file.clone()),
            analyzer: self.analyzer.apply_global(&global.analyzer),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE
    /// - Global → Project: UNION with `!item` negation
    /// - Any → Env vars: REPLACE
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(project) = project_dir {
            let local_path = project_config_path(project);
            if local_path.exists() {
                debug!("loading project config {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply `REPOTREE_*` environment variables as explicit overrides.
    ///
    /// `REPOTREE_MARKER_FILE`, `REPOTREE_ANALYZER__EXTENSIONS=json,unit`.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("REPOTREE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("analyzer.extensions")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("images_dir") {
            settings.images_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("registry_file") {
            settings.registry_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("marker_file") {
            settings.marker_file = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("analyzer.extensions") {
            settings.analyzer.extensions = val;
        }
        if let Ok(val) = config.get_bool("analyzer.check_references") {
            settings.analyzer.check_references = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn given_defaults_when_created_then_marker_is_modinfo() {
        let settings = Settings::default();
        assert_eq!(settings.marker_file, "modinfo.json");
        assert_eq!(settings.analyzer.extensions, strings(&["json"]));
        assert!(settings.analyzer.check_references);
        assert!(settings.images_dir.ends_with("images"));
        assert!(settings.registry_file.ends_with("repositories/repositories.json"));
    }

    #[test]
    fn given_tilde_in_images_dir_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            images_dir: PathBuf::from("~/.repotree/images"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let images = settings.images_dir.to_string_lossy();
        assert!(images.starts_with(&home), "images_dir: {}", images);
        assert!(!images.contains('~'));
    }

    #[test]
    fn test_merge_array_union() {
        let result = AnalyzerConfig::merge_array(&strings(&["json"]), &strings(&["jsonc"]));
        assert_eq!(result, strings(&["json", "jsonc"]));
    }

    #[test]
    fn test_merge_array_negation() {
        let result =
            AnalyzerConfig::merge_array(&strings(&["json", "pfx"]), &strings(&["!json", "unit"]));
        assert_eq!(result, strings(&["pfx", "unit"]));
    }

    #[test]
    fn test_merge_array_negation_nonexistent() {
        let result = AnalyzerConfig::merge_array(&strings(&["json"]), &strings(&["!x"]));
        assert_eq!(result, strings(&["json"]));
    }

    #[test]
    fn test_merge_array_duplicates() {
        let result =
            AnalyzerConfig::merge_array(&strings(&["json"]), &strings(&["json", "json"]));
        assert_eq!(result, strings(&["json"]));
    }

    #[test]
    fn test_apply_global_replaces_extensions() {
        let base = AnalyzerConfig::default();
        let global = RawAnalyzerConfig {
            extensions: Some(strings(&["pfx"])),
            check_references: None,
        };
        let result = base.apply_global(&global);
        assert_eq!(result.extensions, strings(&["pfx"]));
        assert!(result.check_references);
    }

    #[test]
    fn test_merge_settings_keeps_unset_fields() {
        let base = Settings::default();
        let overlay = RawSettings {
            images_dir: None,
            registry_file: None,
            marker_file: Some("mod.json".into()),
            analyzer: RawAnalyzerConfig {
                extensions: Some(strings(&["unit"])),
                check_references: Some(false),
            },
        };
        let merged = base.merge_with(&overlay);
        assert_eq!(merged.images_dir, base.images_dir);
        assert_eq!(merged.marker_file, "mod.json");
        assert_eq!(merged.analyzer.extensions, strings(&["json", "unit"]));
        assert!(!merged.analyzer.check_references);
    }

    #[test]
    fn test_analyzer_matches_extension() {
        let analyzer = AnalyzerConfig::default();
        assert!(analyzer.matches("/units/tank.json"));
        assert!(analyzer.matches("/units/TANK.JSON"));
        assert!(!analyzer.matches("/units/tank.json.bak"));
        assert!(!analyzer.matches("/units/json"));
    }

    #[test]
    fn test_to_toml_contains_fields() {
        let toml = Settings::default().to_toml().unwrap();
        assert!(toml.contains("marker_file = \"modinfo.json\""));
        assert!(toml.contains("[analyzer]"));
    }
}
