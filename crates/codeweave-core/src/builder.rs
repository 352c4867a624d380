//! Graph Builder
//!
//! Discovers source files under a root, parses each one into a
//! [`SourceFile`], and adds its File, Symbol and Import nodes plus CONTAINS
//! edges to the graph. Cross-file edges (IMPORTS, USES, SUBCLASS_OF) are
//! added afterwards by [`crate::linker`].
//!
//! ## Usage
//!
//! ```ignore
//! use codeweave_core::builder::{collect_files, BuilderConfig};
//! use std::path::Path;
//!
//! let discovered = collect_files(Path::new("."), &BuilderConfig::default())?;
//! println!("{} sources", discovered.sources.len());
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use tree_sitter::{InputEdit, Tree};

use codeweave_config::AnalysisConfig;

use crate::frontend;
use crate::graph::{import_node_id, CodeGraph, EdgeData, FileInfo, Node};
use crate::model::FileModel;
use crate::parser::{CodeParser, ParserError, SupportedLanguage};
use crate::tsconfig::CONFIG_FILE_NAMES;

/// Custom ignore file honored next to `.gitignore`.
pub const IGNORE_FILE_NAME: &str = ".codeweaveignore";

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during graph building.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// IO error
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parser error
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl BuilderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Builder Configuration
// ============================================================================

/// Configuration for file discovery.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Restrict discovery to one language family (None = all supported)
    pub language: Option<SupportedLanguage>,
    /// Maximum number of files to process (None = unlimited)
    pub max_files: Option<usize>,
    /// Path patterns to exclude (glob patterns or bare directory names)
    pub exclude_patterns: Vec<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            language: None,
            max_files: None,
            exclude_patterns: AnalysisConfig::default().exclude_patterns,
        }
    }
}

impl BuilderConfig {
    /// Build from the `[analysis]` section of the workspace config.
    pub fn from_analysis(analysis: &AnalysisConfig) -> Result<Self, BuilderError> {
        let language = analysis
            .language
            .as_deref()
            .map(str::parse::<SupportedLanguage>)
            .transpose()?;
        Ok(Self {
            language,
            max_files: analysis.max_files,
            exclude_patterns: analysis.exclude_patterns.clone(),
        })
    }

    pub fn with_language(mut self, language: Option<SupportedLanguage>) -> Self {
        self.language = language;
        self
    }

    fn accepts(&self, language: SupportedLanguage) -> bool {
        self.language.is_none_or(|wanted| wanted.same_family(language))
    }

    /// Glob set for `exclude_patterns`; a bare name like `node_modules`
    /// excludes that directory at any depth.
    fn exclude_glob_set(&self) -> Result<GlobSet, BuilderError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let expanded = if pattern.contains(['*', '/', '?', '[']) {
                vec![pattern.clone()]
            } else {
                vec![format!("{pattern}/**"), format!("**/{pattern}/**")]
            };
            for glob in expanded {
                let glob = Glob::new(&glob).map_err(|source| BuilderError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                builder.add(glob);
            }
        }
        builder.build().map_err(|source| BuilderError::InvalidPattern {
            pattern: self.exclude_patterns.join(","),
            source,
        })
    }
}

// ============================================================================
// File Discovery
// ============================================================================

/// Repository-relative paths found under a root, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredFiles {
    pub sources: Vec<(String, SupportedLanguage)>,
    /// `tsconfig.json` / `jsconfig.json` files
    pub project_configs: Vec<String>,
}

/// Walk `root` and collect supported source files and project configs.
///
/// Uses the `ignore` crate to respect `.gitignore`, `.codeweaveignore` and
/// global gitignore patterns, then applies `exclude_patterns`.
pub fn collect_files(root: &Path, config: &BuilderConfig) -> Result<DiscoveredFiles, BuilderError> {
    if !root.is_dir() {
        return Err(BuilderError::RootNotFound(root.to_path_buf()));
    }
    let glob_set = config.exclude_glob_set()?;
    let mut discovered = DiscoveredFiles::default();

    let walker = WalkBuilder::new(root)
        .follow_links(false)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .add_custom_ignore_filename(IGNORE_FILE_NAME)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Error walking directory: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let Some(rel_path) = relative_path(root, path) else {
            continue;
        };
        if glob_set.is_match(&rel_path) {
            continue;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if CONFIG_FILE_NAMES.contains(&file_name) {
            discovered.project_configs.push(rel_path);
            continue;
        }

        match SupportedLanguage::from_path(path) {
            Some(language) if config.accepts(language) => {
                discovered.sources.push((rel_path, language));
            }
            _ => {}
        }
    }

    // Sort for deterministic ordering
    discovered.sources.sort();
    discovered.project_configs.sort();

    if let Some(max) = config.max_files {
        if discovered.sources.len() > max {
            info!("Reached maximum file limit of {}", max);
            discovered.sources.truncate(max);
        }
    }

    Ok(discovered)
}

/// `path` relative to `root` with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// SHA-256 of a file's text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Source Files
// ============================================================================

/// A parsed file: its text, tree, semantic model and the node ids it owns.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub language: SupportedLanguage,
    pub text: String,
    pub tree: Tree,
    pub model: FileModel,
    /// Node id of `model.symbols[i]`
    pub symbol_ids: Vec<String>,
    /// Node id of `model.imports[i]`
    pub import_ids: Vec<String>,
}

impl SourceFile {
    /// Parse `text` from scratch.
    pub fn parse(
        parser: &mut CodeParser,
        path: impl Into<String>,
        text: String,
    ) -> Result<Self, BuilderError> {
        let tree = parser.parse(&text)?;
        Ok(Self::from_tree(path.into(), parser.language(), text, tree))
    }

    /// Parse `new_text` incrementally from this file's tree.
    pub fn reparse(
        &self,
        parser: &mut CodeParser,
        edits: &[InputEdit],
        new_text: String,
    ) -> Result<Self, BuilderError> {
        let tree = parser.reparse(&self.tree, edits, &new_text)?;
        Ok(Self::from_tree(self.path.clone(), self.language, new_text, tree))
    }

    fn from_tree(path: String, language: SupportedLanguage, text: String, tree: Tree) -> Self {
        let model = frontend::extract(language, &tree, &text);
        if model.has_errors {
            debug!("{} has syntax errors; extraction skipped erroneous regions", path);
        }
        let (symbol_ids, import_ids) = assign_ids(&path, &model);
        Self {
            path,
            language,
            text,
            tree,
            model,
            symbol_ids,
            import_ids,
        }
    }

    /// Index of the first top-level symbol called `name`.
    pub fn top_level_symbol(&self, name: &str) -> Option<usize> {
        self.model
            .top_level()
            .find(|&i| self.model.symbols[i].name == name)
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            language: self.language,
            hash: content_hash(&self.text),
            line_count: self.text.lines().count(),
        }
    }

    /// Add this file's nodes and CONTAINS edges to `graph`.
    pub fn add_to_graph(&self, graph: &mut CodeGraph) {
        graph.add_node(Node::file(self.path.clone(), self.info(), self.text.len()));

        for (i, symbol) in self.model.symbols.iter().enumerate() {
            let id = &self.symbol_ids[i];
            graph.add_node(Node::symbol(
                id.clone(),
                symbol.name.clone(),
                self.path.clone(),
                symbol.range,
                symbol.info.clone(),
            ));
            let parent = symbol
                .parent
                .map_or(self.path.as_str(), |p| self.symbol_ids[p].as_str());
            graph.add_edge(parent, id, EdgeData::contains());
        }

        for (i, import) in self.model.imports.iter().enumerate() {
            let id = &self.import_ids[i];
            graph.add_node(Node::import(id.clone(), self.path.clone(), import.clone()));
            graph.add_edge(&self.path, id, EdgeData::contains());
        }
    }
}

/// Deterministic node ids; repeats within the file get a `#n` suffix in
/// source order.
fn assign_ids(path: &str, model: &FileModel) -> (Vec<String>, Vec<String>) {
    let mut used: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut unique = |base: String| -> String {
        if used.insert(base.clone()) {
            return base;
        }
        let n = counts.entry(base.clone()).or_insert(1);
        loop {
            *n += 1;
            let candidate = format!("{base}#{n}");
            if used.insert(candidate.clone()) {
                return candidate;
            }
        }
    };

    let mut symbol_ids: Vec<String> = Vec::with_capacity(model.symbols.len());
    for symbol in &model.symbols {
        let prefix = symbol.parent.map_or(path, |p| symbol_ids[p].as_str());
        let id = unique(format!("{prefix}:{}", symbol.name));
        symbol_ids.push(id);
    }
    let import_ids = model
        .imports
        .iter()
        .map(|import| unique(import_node_id(path, &import.id_key())))
        .collect();
    (symbol_ids, import_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_builder_config_default() {
        let config = BuilderConfig::default();
        assert!(config.language.is_none());
        assert!(config.max_files.is_none());
        assert!(config.exclude_patterns.contains(&"**/node_modules/**".to_string()));
    }

    #[test]
    fn test_collect_files_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "b.py", "");
        write(temp.path(), "a/app.ts", "");
        write(temp.path(), "a/tsconfig.json", "{}");
        write(temp.path(), "node_modules/lib/index.js", "");
        write(temp.path(), "notes.md", "");
        write(temp.path(), "skip/me.py", "");
        write(temp.path(), IGNORE_FILE_NAME, "skip/\n");

        let found = collect_files(temp.path(), &BuilderConfig::default()).unwrap();
        assert_eq!(
            found.sources,
            vec![
                ("a/app.ts".to_string(), SupportedLanguage::TypeScript),
                ("b.py".to_string(), SupportedLanguage::Python),
            ]
        );
        assert_eq!(found.project_configs, vec!["a/tsconfig.json".to_string()]);
    }

    #[test]
    fn test_collect_files_language_filter_and_limit() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "");
        write(temp.path(), "b.py", "");
        write(temp.path(), "c.js", "");

        let config = BuilderConfig {
            max_files: Some(1),
            ..BuilderConfig::default()
        }
        .with_language(Some(SupportedLanguage::Python));
        let found = collect_files(temp.path(), &config).unwrap();
        assert_eq!(found.sources, vec![("a.py".to_string(), SupportedLanguage::Python)]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let err = collect_files(Path::new("/definitely/not/here"), &BuilderConfig::default());
        assert!(matches!(err, Err(BuilderError::RootNotFound(_))));
    }

    #[test]
    fn test_duplicate_definitions_get_suffixes() {
        let mut parser = CodeParser::new(SupportedLanguage::Python).unwrap();
        let text = "def f():\n    pass\n\ndef f():\n    pass\n".to_string();
        let file = SourceFile::parse(&mut parser, "m.py", text).unwrap();
        assert_eq!(file.symbol_ids, vec!["m.py:f", "m.py:f#2"]);
    }

    #[test]
    fn test_add_to_graph_creates_containment() {
        let mut parser = CodeParser::new(SupportedLanguage::Python).unwrap();
        let text = "import os\n\nclass A:\n    def m(self):\n        pass\n".to_string();
        let file = SourceFile::parse(&mut parser, "m.py", text).unwrap();

        let mut graph = CodeGraph::new();
        file.add_to_graph(&mut graph);

        assert!(graph.get_node("m.py").unwrap().is_file());
        assert!(graph.get_node("m.py:A").unwrap().is_class());
        assert_eq!(graph.parent("m.py:A:m").unwrap().id, "m.py:A");
        assert!(graph.get_node("m.py:<import>:os").unwrap().is_import());
        assert_eq!(graph.get_node("m.py").unwrap().as_file().unwrap().hash, content_hash(&file.text));
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash("");
        assert_eq!(hash.len(), 64);
        assert!(hash.starts_with("e3b0c442"));
    }
}
