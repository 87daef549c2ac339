//! JSON reference analyzer
//!
//! Walks every string in a project's JSON files and reports path references
//! that are malformed or point at files missing from the project tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::application::services::Project;
use crate::application::ApplicationResult;
use crate::config::AnalyzerConfig;
use crate::domain::{AnalysisResult, ArenaTree, NodeId, Tip};
use crate::infrastructure::traits::FileSystem;

pub const MISSING_LEADING_SLASH: &str = "Missing leading slash";
pub const INCORRECT_SLASH: &str = "Incorrect slash";

/// Produces one [`AnalysisResult`] per analyzable file of a project.
pub struct JsonAnalyzer {
    fs: Arc<dyn FileSystem>,
    config: AnalyzerConfig,
}

impl JsonAnalyzer {
    pub fn new(fs: Arc<dyn FileSystem>, config: AnalyzerConfig) -> Self {
        Self { fs, config }
    }

    /// Analyzes the project's files in parallel; results follow tree pre-order.
    ///
    /// Files that cannot be read or parsed are skipped.
    #[instrument(level = "debug", skip_all, fields(project = %project.name))]
    pub fn analyze(&self, project: &Project) -> ApplicationResult<Vec<AnalysisResult>> {
        let files = self.collect_files(project)?;
        debug!("analyzing {} files", files.len());

        let results = files
            .par_iter()
            .filter_map(|(id, path)| self.analyze_file(&project.tree, *id, path))
            .collect::<Vec<_>>();

        debug!(
            "{} of {} files have tips",
            results.iter().filter(|r| !r.is_clean()).count(),
            results.len()
        );
        Ok(results)
    }

    fn collect_files(&self, project: &Project) -> ApplicationResult<Vec<(NodeId, PathBuf)>> {
        let root = project.tree.root()?;
        let mut files = Vec::new();
        for node in project.tree.walk(root)? {
            if node.is_leaf() && node.id != root && self.config.matches(&node.value) {
                files.push((node.id, project.absolute_path(node.id)?));
            }
        }
        Ok(files)
    }

    fn analyze_file(&self, tree: &ArenaTree, id: NodeId, path: &Path) -> Option<AnalysisResult> {
        let content = match self.fs.read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping unreadable {}: {}", path.display(), e);
                return None;
            }
        };
        let json: Value = match serde_json::from_str(&content) {
            Ok(json) => json,
            Err(e) => {
                warn!("skipping unparsable {}: {}", path.display(), e);
                return None;
            }
        };

        let tips = self.analyze_value(tree, &json);
        match AnalysisResult::new(path.to_string_lossy(), tips) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("skipping {}: {}", id, e);
                None
            }
        }
    }

    /// Tips for every string in `json`; the document itself is named `root`.
    pub fn analyze_value(&self, tree: &ArenaTree, json: &Value) -> Vec<Tip> {
        let mut tips = Vec::new();
        self.visit(tree, "root", json, &mut tips);
        tips
    }

    fn visit(&self, tree: &ArenaTree, name: &str, value: &Value, tips: &mut Vec<Tip>) {
        match value {
            Value::String(s) => self.check_string(tree, name, s, tips),
            Value::Object(members) => {
                for (key, member) in members {
                    self.visit(tree, key, member, tips);
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.visit(tree, &format!("[{}][{}]", name, i), item, tips);
                }
            }
            _ => {}
        }
    }

    fn check_string(&self, tree: &ArenaTree, name: &str, s: &str, tips: &mut Vec<Tip>) {
        if !s.contains('/') && !s.contains('\\') {
            return;
        }

        if !s.starts_with('/') {
            tips.push(Tip::new(name, s, MISSING_LEADING_SLASH));
        }
        if s.contains('\\') {
            tips.push(Tip::new(name, s, INCORRECT_SLASH));
        }

        if !self.config.check_references || !s.ends_with(".json") {
            return;
        }

        let mut normalized = s.replace('\\', "/");
        if !normalized.starts_with('/') {
            normalized.insert(0, '/');
        }
        if tree.resolve_str(&normalized).is_err() {
            tips.push(Tip::new(
                name,
                s,
                format!("File does not exist even with correct path: {}", normalized),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TreeBuilder;
    use crate::infrastructure::traits::RealFileSystem;
    use serde_json::json;

    fn tree() -> ArenaTree {
        TreeBuilder::new()
            .build_from_segments(vec![
                (None, "mod"),
                (Some("mod"), "units"),
                (Some("mod/units"), "tank.json"),
            ])
            .unwrap()
    }

    fn analyzer() -> JsonAnalyzer {
        JsonAnalyzer::new(Arc::new(RealFileSystem), AnalyzerConfig::default())
    }

    #[test]
    fn test_plain_strings_have_no_tips() {
        let tips = analyzer().analyze_value(&tree(), &json!({"name": "Tank", "hp": 100}));
        assert!(tips.is_empty());
    }

    #[test]
    fn test_resolving_reference_is_clean() {
        let tips = analyzer().analyze_value(&tree(), &json!({"base": "/units/tank.json"}));
        assert!(tips.is_empty());
    }

    #[test]
    fn test_missing_leading_slash_still_resolves() {
        let tips = analyzer().analyze_value(&tree(), &json!({"base": "units/tank.json"}));
        assert_eq!(tips, vec![Tip::new("base", "units/tank.json", MISSING_LEADING_SLASH)]);
    }

    #[test]
    fn test_backslash_reference() {
        let tips = analyzer().analyze_value(&tree(), &json!({"base": "\\units\\tank.json"}));
        assert_eq!(
            tips,
            vec![
                Tip::new("base", "\\units\\tank.json", MISSING_LEADING_SLASH),
                Tip::new("base", "\\units\\tank.json", INCORRECT_SLASH),
            ]
        );
    }

    #[test]
    fn test_missing_file_reported_with_normalized_path() {
        let tips = analyzer().analyze_value(&tree(), &json!({"base": "/units/bot.json"}));
        assert_eq!(
            tips,
            vec![Tip::new(
                "base",
                "/units/bot.json",
                "File does not exist even with correct path: /units/bot.json"
            )]
        );
    }

    #[test]
    fn test_non_json_reference_only_gets_slash_tips() {
        let tips = analyzer().analyze_value(&tree(), &json!({"icon": "/ui/tank.png"}));
        assert!(tips.is_empty());
    }

    #[test]
    fn test_array_items_are_named_by_index() {
        let tips = analyzer().analyze_value(&tree(), &json!({"weapons": ["a/b.png"]}));
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].property_name, "[weapons][0]");
    }

    #[test]
    fn test_root_string_is_named_root() {
        let tips = analyzer().analyze_value(&tree(), &json!("a/b.png"));
        assert_eq!(tips[0].property_name, "root");
    }

    #[test]
    fn test_reference_checking_can_be_disabled() {
        let config = AnalyzerConfig {
            check_references: false,
            ..AnalyzerConfig::default()
        };
        let analyzer = JsonAnalyzer::new(Arc::new(RealFileSystem), config);
        let tips = analyzer.analyze_value(&tree(), &json!({"base": "/units/bot.json"}));
        assert!(tips.is_empty());
    }
}
