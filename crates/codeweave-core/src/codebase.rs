//! Codebase session.
//!
//! A [`Codebase`] owns one working tree for the length of a mutation session:
//! the parsed files, the graph built from them, the queue of pending text
//! transactions and the snapshot `reset()` returns to. It is single-threaded
//! and holds no global state; every operation goes through the instance.
//!
//! ```ignore
//! use codeweave_core::{Codebase, UsageType};
//!
//! let mut codebase = Codebase::build("path/to/repo", None)?;
//! let foo = codebase.get_function("foo").unwrap().id.clone();
//! codebase.rename(&foo, "bar")?;
//! println!("{}", codebase.preview_diff()?);
//! codebase.commit()?;
//! ```

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use similar::TextDiff;
use thiserror::Error;
use tracing::{debug, info, warn};

use codeweave_config::WeaveConfig;

use crate::builder::{collect_files, BuilderConfig, BuilderError, SourceFile};
use crate::graph::{CodeGraph, EdgeType, Node, NodeKind};
use crate::linker::{link, LinkStats};
use crate::model::{ByteRange, HasName};
use crate::parser::{input_edits, CodeParser, ParserError, SupportedLanguage};
use crate::resolver::{Resolution, ResolutionCache, Resolver};
use crate::transaction::{
    apply_transactions, sort_for_apply, Enqueued, SessionLimits, Transaction, TransactionError,
    TransactionKind, TransactionManager, TransactionRequest,
};
use crate::tsconfig::ProjectConfigs;
use crate::usage::{self, Usage, UsageType};
use crate::validation::{post_init_validation, PostInitValidationStatus, ValidationReport};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum CodebaseError {
    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("cannot {action} '{id}': {reason}")]
    NotEditable {
        id: String,
        action: &'static str,
        reason: String,
    },

    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),

    #[error("file already exists: {0}")]
    FileExists(String),

    #[error("validation failed: {}", .0.status)]
    Validation(ValidationReport),
}

impl CodebaseError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn not_editable(id: &str, action: &'static str, reason: impl Into<String>) -> Self {
        Self::NotEditable {
            id: id.to_string(),
            action,
            reason: reason.into(),
        }
    }

    /// The transaction error behind this one, if any.
    pub fn as_transaction_error(&self) -> Option<&TransactionError> {
        match self {
            CodebaseError::Transaction(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodebaseError>;

// ============================================================================
// Options and Summaries
// ============================================================================

/// Everything `build_with_options` needs besides the root.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub builder: BuilderConfig,
    pub limits: SessionLimits,
}

impl BuildOptions {
    /// Options from a loaded workspace config.
    pub fn from_config(config: &WeaveConfig) -> Result<Self> {
        Ok(Self {
            builder: BuilderConfig::from_analysis(&config.analysis)?,
            limits: SessionLimits {
                max_transactions: config.session.max_transactions,
                max_duration: config.session.max_duration(),
            },
        })
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Files rewritten or deleted, in commit order
    pub files: Vec<String>,
    pub transactions: usize,
    /// Epoch after the commit
    pub epoch: u64,
}

/// Node and edge counts for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodebaseStats {
    pub files: usize,
    pub symbols: usize,
    pub imports: usize,
    pub external_modules: usize,
    pub edges: BTreeMap<&'static str, usize>,
    pub link: LinkStats,
}

/// Committed state `reset()` returns to.
#[derive(Debug, Clone)]
struct Snapshot {
    graph: CodeGraph,
    files: BTreeMap<String, SourceFile>,
}

// ============================================================================
// Codebase
// ============================================================================

pub struct Codebase {
    root: PathBuf,
    graph: CodeGraph,
    files: BTreeMap<String, SourceFile>,
    configs: ProjectConfigs,
    parsers: HashMap<SupportedLanguage, CodeParser>,
    transactions: TransactionManager,
    cache: ResolutionCache,
    epoch: u64,
    link_stats: LinkStats,
    snapshot: Snapshot,
}

impl Codebase {
    /// Parse every supported file under `root`.
    ///
    /// `language_hint` restricts the build to one language family.
    pub fn build(root: impl AsRef<Path>, language_hint: Option<SupportedLanguage>) -> Result<Self> {
        let options = BuildOptions {
            builder: BuilderConfig::default().with_language(language_hint),
            ..Default::default()
        };
        Self::build_with_options(root, options)
    }

    pub fn build_with_options(root: impl AsRef<Path>, options: BuildOptions) -> Result<Self> {
        let started = Instant::now();
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|_| BuilderError::RootNotFound(root.to_path_buf()))?;

        let discovered = collect_files(&root, &options.builder)?;
        if discovered.sources.is_empty() {
            warn!("No supported files found in {}", root.display());
        }
        info!("Found {} files to process", discovered.sources.len());

        let configs = ProjectConfigs::load(&root, &discovered.project_configs);
        let mut parsers: HashMap<SupportedLanguage, CodeParser> = HashMap::new();
        let mut files = BTreeMap::new();

        for (rel_path, language) in &discovered.sources {
            let text = match std::fs::read_to_string(root.join(rel_path)) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping {}: {}", rel_path, e);
                    continue;
                }
            };
            let parser = parser_for(&mut parsers, *language)?;
            match SourceFile::parse(parser, rel_path.clone(), text) {
                Ok(file) => {
                    files.insert(rel_path.clone(), file);
                }
                Err(e) => warn!("Error processing {}: {}", rel_path, e),
            }
        }

        let mut graph = CodeGraph::new();
        for file in files.values() {
            file.add_to_graph(&mut graph);
        }

        let mut cache = ResolutionCache::new();
        let link_stats = link(&mut graph, &files, &configs, &mut cache, 0);

        info!("Graph summary:");
        info!("  - Files: {}", files.len());
        info!("  - Nodes: {}", graph.node_count());
        info!("  - Edges: {}", graph.edge_count());
        info!(
            "  - Imports resolved: {}/{}",
            link_stats.resolved_imports, link_stats.imports
        );
        debug!("Built in {:?}", started.elapsed());

        let snapshot = Snapshot {
            graph: graph.clone(),
            files: files.clone(),
        };
        Ok(Self {
            root,
            graph,
            files,
            configs,
            parsers,
            transactions: TransactionManager::new(options.limits),
            cache,
            epoch: 0,
            link_stats,
            snapshot,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    /// Graph version, bumped on every commit and reset.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link_stats
    }

    pub fn limits(&self) -> SessionLimits {
        self.transactions.limits()
    }

    pub fn set_limits(&mut self, limits: SessionLimits) {
        self.transactions.set_limits(limits);
    }

    /// Swap the time source behind the preview limit. Restarts the clock.
    pub fn set_clock(&mut self, clock: fn() -> Instant) {
        self.transactions.set_clock(clock);
    }

    /// Pending transactions across all files.
    pub fn pending_transactions(&self) -> usize {
        self.transactions.pending_count()
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Current committed text of `path`.
    pub fn file_text(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|f| f.text.as_str())
    }

    /// Paths of every tracked file, sorted.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.keys().map(String::as_str)
    }

    pub fn source_file(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// Source text covered by a node.
    pub fn source(&self, id: &str) -> Option<&str> {
        let node = self.graph.get_node(id)?;
        let text = self.file_text(&node.file)?;
        text.get(node.range.start..node.range.end)
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.graph.get_node(id)
    }

    fn node(&self, id: &str) -> Result<&Node> {
        self.graph
            .get_node(id)
            .ok_or_else(|| CodebaseError::NodeNotFound(id.to_string()))
    }

    // ------------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------------

    /// File nodes ordered by path.
    pub fn files(&self) -> impl Iterator<Item = &Node> + '_ {
        self.files.keys().filter_map(|path| self.graph.get_node(path))
    }

    /// Every symbol at any depth: files by path, definitions in source order.
    fn all_symbols(&self) -> impl Iterator<Item = &Node> + '_ {
        self.files
            .values()
            .flat_map(|file| file.symbol_ids.iter())
            .filter_map(|id| self.graph.get_node(id))
    }

    /// Top-level symbols: files by path, definitions in source order.
    pub fn symbols(&self) -> impl Iterator<Item = &Node> + '_ {
        self.files
            .values()
            .flat_map(|file| file.model.top_level().map(move |i| &file.symbol_ids[i]))
            .filter_map(|id| self.graph.get_node(id))
    }

    pub fn imports(&self) -> impl Iterator<Item = &Node> + '_ {
        self.files
            .values()
            .flat_map(|file| file.import_ids.iter())
            .filter_map(|id| self.graph.get_node(id))
    }

    /// Classes at any nesting depth.
    pub fn classes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.all_symbols().filter(|n| n.is_class())
    }

    /// Functions (not methods) at any nesting depth.
    pub fn functions(&self) -> impl Iterator<Item = &Node> + '_ {
        self.all_symbols().filter(|n| n.is_function())
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn get_file(&self, path: &str) -> Option<&Node> {
        self.files
            .contains_key(path)
            .then(|| self.graph.get_node(path))
            .flatten()
    }

    /// First top-level symbol called `name`.
    pub fn get_symbol(&self, name: &str) -> Option<&Node> {
        self.symbols().find(|n| n.name == name)
    }

    pub fn get_class(&self, name: &str) -> Option<&Node> {
        self.classes().find(|n| n.name == name)
    }

    pub fn get_function(&self, name: &str) -> Option<&Node> {
        self.functions().find(|n| n.name == name)
    }

    /// Import in `file` binding `name`.
    pub fn get_import(&self, file: &str, name: &str) -> Option<&Node> {
        let source = self.files.get(file)?;
        source
            .model
            .imports
            .iter()
            .position(|i| i.binding() == name || i.alias == name)
            .and_then(|index| self.graph.get_node(&source.import_ids[index]))
    }

    /// Terminal node an import resolves to in the current graph.
    pub fn resolved_symbol(&self, import_id: &str) -> Option<&Node> {
        self.graph.import_target(import_id)
    }

    /// Resolve an import, memoized for the current epoch.
    pub fn resolve(&mut self, import_id: &str) -> Result<Resolution> {
        let node = self.node(import_id)?;
        if !node.is_import() {
            return Err(CodebaseError::not_editable(import_id, "resolve", "not an import"));
        }
        let file = node.file.clone();
        let index = self
            .files
            .get(&file)
            .and_then(|f| f.import_ids.iter().position(|id| id == import_id))
            .ok_or_else(|| CodebaseError::NodeNotFound(import_id.to_string()))?;
        let resolver = Resolver::new(&self.files, &self.configs);
        Ok(self
            .cache
            .get_or_insert_with(import_id, self.epoch, || resolver.resolve(&file, index)))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn usages(&self, id: &str, types: UsageType) -> Result<Vec<Usage>> {
        self.node(id)?;
        Ok(usage::usages(&self.graph, id, types))
    }

    /// Distinct nodes using `id`.
    pub fn symbol_usages(&self, id: &str, types: UsageType) -> Result<Vec<&Node>> {
        self.node(id)?;
        Ok(usage::symbol_usages(&self.graph, id, types)
            .iter()
            .filter_map(|u| self.graph.get_node(u))
            .collect())
    }

    pub fn dependencies(&self, id: &str, max_depth: usize, types: UsageType) -> Result<Vec<&Node>> {
        self.node(id)?;
        Ok(usage::dependencies(&self.graph, id, max_depth, types))
    }

    /// Run the post-build health checks.
    pub fn validation_report(&self) -> ValidationReport {
        post_init_validation(self)
    }

    /// Like [`Codebase::validation_report`] but fails unless healthy.
    pub fn validate(&self) -> Result<ValidationReport> {
        let report = self.validation_report();
        if report.status == PostInitValidationStatus::Success {
            Ok(report)
        } else {
            Err(CodebaseError::Validation(report))
        }
    }

    pub fn stats(&self) -> CodebaseStats {
        let mut edges = BTreeMap::new();
        for edge_type in [
            EdgeType::Contains,
            EdgeType::SubclassOf,
            EdgeType::Imports,
            EdgeType::Uses,
        ] {
            edges.insert(edge_type.as_str(), self.graph.edges_by_type(edge_type).count());
        }
        CodebaseStats {
            files: self.files.len(),
            symbols: self.files.values().map(|f| f.symbol_ids.len()).sum(),
            imports: self.files.values().map(|f| f.import_ids.len()).sum(),
            external_modules: self.graph.iter_nodes().filter(|n| n.is_external()).count(),
            edges,
            link: self.link_stats,
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    fn enqueue(&mut self, request: TransactionRequest) -> Result<Enqueued> {
        let text = self
            .files
            .get(&request.file)
            .map(|f| f.text.as_str())
            .ok_or_else(|| CodebaseError::NodeNotFound(request.file.clone()))?;
        Ok(self.transactions.enqueue(request, text)?)
    }

    /// Enqueue several requests, leaving the queue untouched if any fails.
    fn enqueue_all(&mut self, requests: Vec<TransactionRequest>) -> Result<Vec<Enqueued>> {
        let backup = self.transactions.clone();
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            match self.enqueue(request) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    self.transactions = backup;
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Raw replacement of `range` in `file`.
    pub fn edit_range(&mut self, file: &str, range: ByteRange, text: &str) -> Result<Enqueued> {
        let kind = if range.is_empty() {
            TransactionKind::Insert
        } else {
            TransactionKind::Edit
        };
        self.enqueue(TransactionRequest {
            kind,
            ..TransactionRequest::edit(file, range, text)
        })
    }

    /// Replace a node's source.
    ///
    /// For a File the new content is diffed against the current text and
    /// only the changed region is queued, so edits elsewhere in the file do
    /// not conflict with it.
    pub fn edit(&mut self, id: &str, new_text: &str) -> Result<Vec<Enqueued>> {
        let node = self.node(id)?;
        let requests = match &node.kind {
            NodeKind::File(_) => {
                let old = self.file_text(id).unwrap_or_default();
                file_edit_requests(id, old, new_text)
            }
            NodeKind::Symbol(_) | NodeKind::Import(_) => {
                vec![TransactionRequest::edit(node.file.clone(), node.range, new_text)]
            }
            NodeKind::ExternalModule => {
                return Err(CodebaseError::not_editable(id, "edit", "external modules have no source"))
            }
        };
        self.enqueue_all(requests)
    }

    /// Queue removal of a node.
    ///
    /// Symbols lose their extended range (decorators, comments, `export`);
    /// when that leaves only whitespace on its lines the lines go too.
    pub fn remove(&mut self, id: &str) -> Result<Enqueued> {
        let node = self.node(id)?;
        let request = match &node.kind {
            NodeKind::File(_) => {
                let len = self.file_text(id).map_or(0, str::len);
                TransactionRequest::remove_file(id, len)
            }
            NodeKind::Symbol(info) => {
                let text = self.file_text(&node.file).unwrap_or_default();
                TransactionRequest::remove(node.file.clone(), whole_lines(text, info.extended_range))
            }
            NodeKind::Import(info) => {
                let shares_statement = self
                    .files
                    .get(&node.file)
                    .map(|f| {
                        f.model
                            .imports
                            .iter()
                            .filter(|i| i.statement_range == info.statement_range)
                            .count()
                            > 1
                    })
                    .unwrap_or(false);
                if shares_statement {
                    return Err(CodebaseError::not_editable(
                        id,
                        "remove",
                        "statement binds other names; edit the statement instead",
                    ));
                }
                let text = self.file_text(&node.file).unwrap_or_default();
                TransactionRequest::remove(node.file.clone(), whole_lines(text, info.statement_range))
            }
            NodeKind::ExternalModule => {
                return Err(CodebaseError::not_editable(id, "remove", "external modules have no source"))
            }
        };
        self.enqueue(request)
    }

    /// Insert `text` on its own line before a symbol, at its indentation.
    pub fn insert_before(&mut self, id: &str, text: &str) -> Result<Enqueued> {
        let node = self.node(id)?;
        if node.is_file() {
            return self.enqueue(TransactionRequest::insert(id, 0, format!("{text}\n")));
        }
        let source = self.file_text(&node.file).unwrap_or_default();
        let start = node.extended_range().start;
        let indent = indentation_at(source, start);
        let request = TransactionRequest::insert(node.file.clone(), start, format!("{text}\n{indent}"));
        self.enqueue(request)
    }

    /// Insert `text` on its own line after a symbol, at its indentation.
    pub fn insert_after(&mut self, id: &str, text: &str) -> Result<Enqueued> {
        let node = self.node(id)?;
        if node.is_file() {
            let source = self.file_text(id).unwrap_or_default();
            let separator = if source.is_empty() || source.ends_with('\n') { "" } else { "\n" };
            let request = TransactionRequest::insert(id, source.len(), format!("{separator}{text}\n"));
            return self.enqueue(request);
        }
        let source = self.file_text(&node.file).unwrap_or_default();
        let indent = indentation_at(source, node.extended_range().start);
        let request = TransactionRequest::insert(node.file.clone(), node.range.end, format!("\n{indent}{text}"));
        self.enqueue(request)
    }

    /// Rename a symbol at its definition and every non-aliased reference.
    ///
    /// Aliased references keep their local name; import statements that name
    /// the symbol are updated. Returns the number of edits queued.
    pub fn rename(&mut self, id: &str, new_name: &str) -> Result<usize> {
        if !is_identifier(new_name) {
            return Err(CodebaseError::InvalidName(new_name.to_string()));
        }
        let node = self.node(id)?;
        if !node.is_symbol() {
            return Err(CodebaseError::not_editable(id, "rename", "only symbols can be renamed"));
        }
        let old_name = node.name.clone();
        if old_name == new_name {
            return Ok(0);
        }
        let name_range = node
            .name_range()
            .ok_or_else(|| CodebaseError::not_editable(id, "rename", "definition has no name token"))?;

        let mut sites: BTreeSet<(String, ByteRange)> = BTreeSet::new();
        sites.insert((node.file.clone(), name_range));

        let types = UsageType::DIRECT | UsageType::CHAINED | UsageType::INDIRECT;
        for usage in usage::usages(&self.graph, id, types) {
            sites.insert((usage.file, usage.match_range));
        }

        let requests: Vec<TransactionRequest> = sites
            .into_iter()
            .filter(|(file, range)| {
                self.file_text(file)
                    .and_then(|text| text.get(range.start..range.end))
                    .is_some_and(|token| token == old_name)
            })
            .map(|(file, range)| TransactionRequest::edit(file, range, new_name))
            .collect();

        let count = requests.len();
        debug!("rename {} -> {}: {} sites", old_name, new_name, count);
        self.enqueue_all(requests)?;
        Ok(count)
    }

    /// Create a new file immediately, parse it and link it into the graph.
    ///
    /// The language comes from the extension. The file counts as created by
    /// this session: `reset()` deletes it.
    pub fn create_file(&mut self, path: &str, content: &str) -> Result<&Node> {
        let language = SupportedLanguage::from_path(Path::new(path))
            .ok_or_else(|| ParserError::UnsupportedLanguage(path.to_string()))?;
        self.add_file(path, content, language)
    }

    /// Write `text` to `path` and add it to the graph parsed as `language`.
    pub fn add_file(&mut self, path: &str, text: &str, language: SupportedLanguage) -> Result<&Node> {
        let rel = path.trim_start_matches("./").to_string();
        if self.files.contains_key(&rel) || self.root.join(&rel).exists() {
            return Err(CodebaseError::FileExists(rel));
        }

        let abs = self.root.join(&rel);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CodebaseError::io(parent, e))?;
        }
        std::fs::write(&abs, text).map_err(|e| CodebaseError::io(&abs, e))?;

        let parser = parser_for(&mut self.parsers, language)?;
        let file = SourceFile::parse(parser, rel.clone(), text.to_string())?;
        file.add_to_graph(&mut self.graph);
        self.files.insert(rel.clone(), file);
        self.resync();
        info!("Added {} ({})", rel, language);
        self.node(&rel)
    }

    // ------------------------------------------------------------------------
    // Session Control
    // ------------------------------------------------------------------------

    /// Apply all pending transactions, file by file in path order.
    ///
    /// The preview clock is checked before each file. When a limit trips,
    /// files already written stay committed and resynchronized and the
    /// remaining transactions stay queued.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        self.transactions.check_count()?;

        let mut committed = Vec::new();
        let mut applied = 0;
        let mut outcome: Result<()> = Ok(());

        for path in self.transactions.files() {
            if let Err(e) = self.transactions.check_time() {
                warn!("Commit stopped before {}: {}", path, e);
                outcome = Err(e.into());
                break;
            }
            let transactions = self.transactions.take_file(&path);
            if let Err(e) = self.commit_file(&path, &transactions) {
                warn!("Commit of {} failed, keeping its transactions queued: {}", path, e);
                self.transactions.requeue(&path, transactions);
                outcome = Err(e);
                break;
            }
            applied += transactions.len();
            committed.push(path);
        }

        if !committed.is_empty() {
            self.resync();
        }
        outcome?;

        info!(
            "Committed {} transactions across {} files (epoch {})",
            applied,
            committed.len(),
            self.epoch
        );
        Ok(CommitSummary {
            files: committed,
            transactions: applied,
            epoch: self.epoch,
        })
    }

    fn commit_file(&mut self, path: &str, transactions: &[Transaction]) -> Result<()> {
        let abs = self.root.join(path);

        if transactions.iter().any(|t| t.kind == TransactionKind::RemoveFile) {
            match std::fs::remove_file(&abs) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CodebaseError::io(&abs, e)),
            }
            self.graph.remove_file_nodes(path);
            self.files.remove(path);
            debug!("Removed {}", path);
            return Ok(());
        }

        let Some(old) = self.files.get(path) else {
            return Err(CodebaseError::NodeNotFound(path.to_string()));
        };
        let applied = apply_transactions(&old.text, transactions);
        let edits = input_edits(
            &old.text,
            &applied.edits,
            transactions.iter().map(|t| t.new_content.as_str()),
        );
        let parser = parser_for(&mut self.parsers, old.language)?;
        let updated = old.reparse(parser, &edits, applied.text)?;
        std::fs::write(&abs, &updated.text).map_err(|e| CodebaseError::io(&abs, e))?;

        self.graph.remove_file_nodes(path);
        updated.add_to_graph(&mut self.graph);
        self.files.insert(path.to_string(), updated);
        debug!("Rewrote {} ({} transactions)", path, transactions.len());
        Ok(())
    }

    /// Bump the epoch and recompute every derived edge.
    fn resync(&mut self) {
        self.epoch += 1;
        self.cache.evict_before(self.epoch);
        self.link_stats = link(
            &mut self.graph,
            &self.files,
            &self.configs,
            &mut self.cache,
            self.epoch,
        );
    }

    /// Drop pending transactions and restore the snapshot: file texts on
    /// disk, the node-id set and the graph. Files created since are deleted.
    pub fn reset(&mut self) -> Result<()> {
        self.transactions.clear();

        for (path, snap) in &self.snapshot.files {
            let changed = self.files.get(path).is_none_or(|f| f.text != snap.text);
            if changed {
                let abs = self.root.join(path);
                if let Some(parent) = abs.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| CodebaseError::io(parent, e))?;
                }
                std::fs::write(&abs, &snap.text).map_err(|e| CodebaseError::io(&abs, e))?;
                debug!("Restored {}", path);
            }
        }
        for path in self.files.keys() {
            if !self.snapshot.files.contains_key(path) {
                let abs = self.root.join(path);
                match std::fs::remove_file(&abs) {
                    Ok(()) => debug!("Deleted {}", path),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(CodebaseError::io(&abs, e)),
                }
            }
        }

        self.files = self.snapshot.files.clone();
        self.graph = self.snapshot.graph.clone();
        self.epoch += 1;
        self.cache.evict_before(self.epoch);
        self.transactions.restart_clock();
        info!("Reset to snapshot (epoch {})", self.epoch);
        Ok(())
    }

    /// Make the current committed state the one `reset()` returns to.
    pub fn checkpoint(&mut self) {
        self.snapshot = Snapshot {
            graph: self.graph.clone(),
            files: self.files.clone(),
        };
        self.transactions.restart_clock();
        debug!("Checkpoint at epoch {}", self.epoch);
    }

    /// Unified diff of committed changes since the snapshot.
    pub fn get_diff(&self) -> String {
        let mut paths: BTreeSet<&String> = self.snapshot.files.keys().collect();
        paths.extend(self.files.keys());
        paths
            .into_iter()
            .map(|path| {
                unified_diff(
                    path,
                    self.snapshot.files.get(path).map(|f| f.text.as_str()),
                    self.file_text(path),
                )
            })
            .collect()
    }

    /// Unified diff of what `commit()` would write, without touching disk.
    pub fn preview_diff(&self) -> Result<String> {
        let mut out = String::new();
        for path in self.transactions.files() {
            let mut transactions = self.transactions.pending_for(&path).to_vec();
            let old = self.file_text(&path);
            if transactions.iter().any(|t| t.kind == TransactionKind::RemoveFile) {
                out.push_str(&unified_diff(&path, old, None));
                continue;
            }
            let Some(old) = old else {
                return Err(CodebaseError::NodeNotFound(path));
            };
            sort_for_apply(&mut transactions);
            let new = apply_transactions(old, &transactions).text;
            out.push_str(&unified_diff(&path, Some(old), Some(&new)));
        }
        Ok(out)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parser_for(
    parsers: &mut HashMap<SupportedLanguage, CodeParser>,
    language: SupportedLanguage,
) -> Result<&mut CodeParser> {
    match parsers.entry(language) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => Ok(entry.insert(CodeParser::new(language)?)),
    }
}

/// `git diff`-style text for one file; empty when unchanged.
fn unified_diff(path: &str, old: Option<&str>, new: Option<&str>) -> String {
    if old == new {
        return String::new();
    }
    let old_header = if old.is_some() { format!("a/{path}") } else { "/dev/null".to_string() };
    let new_header = if new.is_some() { format!("b/{path}") } else { "/dev/null".to_string() };
    TextDiff::from_lines(old.unwrap_or_default(), new.unwrap_or_default())
        .unified_diff()
        .context_radius(3)
        .header(&old_header, &new_header)
        .to_string()
}

/// Minimal requests turning `old` into `new`.
///
/// Pure appends and prepends become inserts, wrapping becomes two inserts,
/// anything else one edit over the differing middle.
fn file_edit_requests(path: &str, old: &str, new: &str) -> Vec<TransactionRequest> {
    if old == new {
        return Vec::new();
    }
    if !old.is_empty() {
        if let Some(tail) = new.strip_prefix(old) {
            return vec![TransactionRequest::insert(path, old.len(), tail)];
        }
        if let Some(head) = new.strip_suffix(old) {
            return vec![TransactionRequest::insert(path, 0, head)];
        }
        if let Some(pos) = new.find(old) {
            return vec![
                TransactionRequest::insert(path, 0, &new[..pos]),
                TransactionRequest::insert(path, old.len(), &new[pos + old.len()..]),
            ];
        }
    }

    let prefix: usize = old
        .chars()
        .zip(new.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();
    let max_suffix = (old.len() - prefix).min(new.len() - prefix);
    let suffix: usize = old[prefix..]
        .chars()
        .rev()
        .zip(new[prefix..].chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .scan(0usize, |total, len| {
            *total += len;
            (*total <= max_suffix).then_some(len)
        })
        .sum();

    let range = ByteRange::new(prefix, old.len() - suffix);
    let replacement = &new[prefix..new.len() - suffix];
    let request = TransactionRequest::edit(path, range, replacement);
    if range.is_empty() {
        vec![TransactionRequest {
            kind: TransactionKind::Insert,
            ..request
        }]
    } else if replacement.is_empty() {
        vec![TransactionRequest::remove(path, range)]
    } else {
        vec![request]
    }
}

/// Leading whitespace of the line containing `offset`.
fn indentation_at(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..offset];
    let width = line.len() - line.trim_start().len();
    &line[..width]
}

/// Grow `range` to full lines when nothing else shares them.
fn whole_lines(text: &str, range: ByteRange) -> ByteRange {
    let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[range.end..]
        .find('\n')
        .map_or(text.len(), |i| range.end + i + 1);
    let before_blank = text[line_start..range.start].trim().is_empty();
    let after_blank = text[range.end..line_end].trim().is_empty();
    if before_blank && after_blank {
        ByteRange::new(line_start, line_end)
    } else {
        range
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn apply(old: &str, requests: &[TransactionRequest]) -> String {
        let mut manager = TransactionManager::new(SessionLimits::default());
        for r in requests {
            manager.enqueue(r.clone(), old).unwrap();
        }
        let transactions = manager.take_file("f");
        apply_transactions(old, &transactions).text
    }

    #[test]
    fn test_file_edit_append_is_single_insert() {
        let requests = file_edit_requests("f", "a\n", "a\nb\n");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, TransactionKind::Insert);
        assert_eq!(requests[0].range, ByteRange::point(2));
    }

    #[test]
    fn test_file_edit_wrap_is_two_inserts() {
        let requests = file_edit_requests("f", "body", "<body>");
        assert_eq!(requests.len(), 2);
        assert_eq!(apply("body", &requests), "<body>");
    }

    #[test]
    fn test_file_edit_middle_change() {
        let old = "def foo():\n    return 1\n";
        let new = "def foo():\n    return 42\n";
        let requests = file_edit_requests("f", old, new);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].range, ByteRange::new(22, 23));
        assert_eq!(requests[0].new_content, "42");
        assert_eq!(apply(old, &requests), new);

        let shrink = file_edit_requests("f", "aXXb", "ab");
        assert_eq!(shrink[0].kind, TransactionKind::Remove);
        assert_eq!(apply("aXXb", &shrink), "ab");

        let unicode = file_edit_requests("f", "héllo", "hello");
        assert_eq!(apply("héllo", &unicode), "hello");
    }

    #[test]
    fn test_whole_lines_and_indentation() {
        let text = "class A:\n    x = 1\n    y = 2\n";
        let x = text.find("x = 1").unwrap();
        assert_eq!(indentation_at(text, x), "    ");
        let range = whole_lines(text, ByteRange::new(x, x + 5));
        assert_eq!(range.slice(text), "    x = 1\n");

        let inline = "a = 1; b = 2\n";
        assert_eq!(whole_lines(inline, ByteRange::new(0, 5)), ByteRange::new(0, 5));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("bar"));
        assert!(is_identifier("_private2"));
        assert!(is_identifier("$el"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
