//! Codebase Graph
//!
//! A directed multigraph over File, Symbol, Import and ExternalModule nodes.
//! Nodes are addressed by deterministic string ids and stored in a petgraph
//! `StableGraph` so indices survive removals during resynchronization.
//!
//! Node id formats:
//!
//! | Node           | Id                          |
//! |----------------|-----------------------------|
//! | File           | `src/app.py`                |
//! | Symbol         | `src/app.py:Outer:method`   |
//! | Import         | `src/app.py:<import>:alias` |
//! | ExternalModule | `external:requests`         |

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::{
    ByteRange, HasBody, HasDecorators, HasName, ImportInfo, SymbolInfo, SymbolKind,
};
use crate::parser::SupportedLanguage;
use crate::usage::UsageType;

/// Prefix of ExternalModule node ids.
pub const EXTERNAL_PREFIX: &str = "external:";

/// Marker segment used in Import node ids.
pub const IMPORT_SEGMENT: &str = "<import>";

// ============================================================================
// Edge Types
// ============================================================================

/// Types of relationships between code entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Ownership (File→Symbol, File→Import, Class→Method, Function→Parameter)
    Contains,
    /// Class inheritance (Class→Class)
    SubclassOf,
    /// Import resolution (Import→Symbol|File|ExternalModule)
    Imports,
    /// References (Symbol|File|Import→Symbol|Import)
    Uses,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::SubclassOf => "SUBCLASS_OF",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Uses => "USES",
        }
    }

    /// Edges recomputed by the resolver after every build or commit.
    pub fn is_derived(&self) -> bool {
        !matches!(self, EdgeType::Contains)
    }
}

// ============================================================================
// Node Kinds
// ============================================================================

/// Copyable discriminant of [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    File,
    Symbol(SymbolKind),
    Import,
    ExternalModule,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Symbol(kind) => kind.as_str(),
            NodeType::Import => "import",
            NodeType::ExternalModule => "external_module",
        }
    }
}

/// Per-file attributes stored on File nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub language: SupportedLanguage,
    /// SHA-256 of the file text
    pub hash: String,
    pub line_count: usize,
}

/// Closed set of node variants, each with its own payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File(FileInfo),
    Symbol(SymbolInfo),
    Import(ImportInfo),
    /// Sentinel for anything resolution could not find; `name` holds the specifier
    ExternalModule,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::File(_) => NodeType::File,
            NodeKind::Symbol(info) => NodeType::Symbol(info.kind),
            NodeKind::Import(_) => NodeType::Import,
            NodeKind::ExternalModule => NodeType::ExternalModule,
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A node in the codebase graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (see module docs for formats)
    pub id: String,

    /// Display name: file path, symbol name, import alias or module specifier
    pub name: String,

    pub kind: NodeKind,

    /// Owning file path; empty for ExternalModule sentinels
    pub file: String,

    /// Byte range of the definition in the owning file
    pub range: ByteRange,
}

impl Node {
    /// Create a File node covering the whole text.
    pub fn file(path: String, info: FileInfo, len: usize) -> Self {
        Self {
            id: path.clone(),
            name: path.clone(),
            kind: NodeKind::File(info),
            file: path,
            range: ByteRange::new(0, len),
        }
    }

    pub fn symbol(id: String, name: String, file: String, range: ByteRange, info: SymbolInfo) -> Self {
        Self {
            id,
            name,
            kind: NodeKind::Symbol(info),
            file,
            range,
        }
    }

    pub fn import(id: String, file: String, info: ImportInfo) -> Self {
        Self {
            id,
            name: info.binding().to_string(),
            range: info.statement_range,
            kind: NodeKind::Import(info),
            file,
        }
    }

    /// Create the sentinel for an unresolvable module specifier.
    pub fn external(specifier: &str) -> Self {
        Self {
            id: external_node_id(specifier),
            name: specifier.to_string(),
            kind: NodeKind::ExternalModule,
            file: String::new(),
            range: ByteRange::default(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.kind, NodeKind::Symbol(_))
    }

    pub fn is_import(&self) -> bool {
        matches!(self.kind, NodeKind::Import(_))
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, NodeKind::ExternalModule)
    }

    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match &self.kind {
            NodeKind::Symbol(info) => Some(info.kind),
            _ => None,
        }
    }

    pub fn is_class(&self) -> bool {
        self.symbol_kind() == Some(SymbolKind::Class)
    }

    pub fn is_function(&self) -> bool {
        self.symbol_kind() == Some(SymbolKind::Function)
    }

    pub fn as_symbol(&self) -> Option<&SymbolInfo> {
        match &self.kind {
            NodeKind::Symbol(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_import(&self) -> Option<&ImportInfo> {
        match &self.kind {
            NodeKind::Import(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileInfo> {
        match &self.kind {
            NodeKind::File(info) => Some(info),
            _ => None,
        }
    }

    /// Range to replace on removal: the symbol plus its decorators, export
    /// keyword and leading comments.
    pub fn extended_range(&self) -> ByteRange {
        match &self.kind {
            NodeKind::Symbol(info) => info.extended_range,
            _ => self.range,
        }
    }
}

impl HasName for Node {
    fn name(&self) -> &str {
        &self.name
    }

    fn name_range(&self) -> Option<ByteRange> {
        match &self.kind {
            NodeKind::Symbol(info) => info.name_range,
            NodeKind::Import(info) => info.alias_range.or(info.name_range),
            _ => None,
        }
    }
}

impl HasBody for Node {
    fn body_range(&self) -> Option<ByteRange> {
        self.as_symbol().and_then(|info| info.body_range)
    }
}

impl HasDecorators for Node {
    fn decorators(&self) -> &[String] {
        self.as_symbol()
            .map(|info| info.decorators.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// Node Ids
// ============================================================================

/// Generate a symbol node id from its file, enclosing names and name.
///
/// # Examples
///
/// ```
/// use codeweave_core::graph::symbol_node_id;
///
/// assert_eq!(
///     symbol_node_id("src/models.py", &["User"], "save"),
///     "src/models.py:User:save"
/// );
/// ```
pub fn symbol_node_id(file_path: &str, containment: &[&str], name: &str) -> String {
    let mut components = vec![file_path];
    components.extend(containment);
    components.push(name);
    components.join(":")
}

/// Id of the Import node binding `key` in `file_path`.
pub fn import_node_id(file_path: &str, key: &str) -> String {
    format!("{file_path}:{IMPORT_SEGMENT}:{key}")
}

pub fn external_node_id(specifier: &str) -> String {
    format!("{EXTERNAL_PREFIX}{specifier}")
}

// ============================================================================
// Edges
// ============================================================================

/// Edge payload stored in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    pub edge_type: EdgeType,

    /// Usage classification for USES and IMPORTS edges
    pub usage_type: Option<UsageType>,

    /// Byte range of the matching identifier in the source's file
    pub match_range: Option<ByteRange>,
}

impl EdgeData {
    pub fn contains() -> Self {
        Self {
            edge_type: EdgeType::Contains,
            usage_type: None,
            match_range: None,
        }
    }

    pub fn subclass_of(match_range: Option<ByteRange>) -> Self {
        Self {
            edge_type: EdgeType::SubclassOf,
            usage_type: None,
            match_range,
        }
    }

    /// Resolution edge; `usage_type` is ALIASED when any import along the
    /// chain renames, INDIRECT otherwise.
    pub fn imports(usage_type: UsageType) -> Self {
        Self {
            edge_type: EdgeType::Imports,
            usage_type: Some(usage_type),
            match_range: None,
        }
    }

    pub fn uses(usage_type: UsageType, match_range: ByteRange) -> Self {
        Self {
            edge_type: EdgeType::Uses,
            usage_type: Some(usage_type),
            match_range: Some(match_range),
        }
    }
}

/// Owned view of an edge, used for comparisons and display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    pub match_range: Option<ByteRange>,
}

// ============================================================================
// CodeGraph
// ============================================================================

/// Graph of the whole codebase.
#[derive(Debug, Clone)]
pub struct CodeGraph {
    graph: StableGraph<Node, EdgeData, petgraph::Directed>,

    /// Map from node ID (string) to petgraph NodeIndex for O(1) lookup
    node_index_map: HashMap<String, NodeIndex>,
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Node Operations
    // ------------------------------------------------------------------------

    /// Add a node to the graph, returning its NodeIndex.
    ///
    /// If a node with the same ID already exists, it will be replaced.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        let node_id = node.id.clone();

        if let Some(&existing_idx) = self.node_index_map.get(&node_id) {
            self.graph.remove_node(existing_idx);
        }

        let idx = self.graph.add_node(node);
        self.node_index_map.insert(node_id, idx);
        idx
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.node_index_map
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index_map.contains_key(id)
    }

    /// Remove a node and all its incident edges
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let idx = self.node_index_map.remove(id)?;
        self.graph.remove_node(idx)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterate over all nodes in unspecified order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// All node ids, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.node_index_map.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ------------------------------------------------------------------------
    // Edge Operations
    // ------------------------------------------------------------------------

    /// Add an edge between two nodes by their string IDs.
    ///
    /// Returns `Some(EdgeIndex)` if both nodes exist, `None` otherwise.
    pub fn add_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        data: EdgeData,
    ) -> Option<EdgeIndex> {
        let source_idx = self.node_index_map.get(source_id)?;
        let target_idx = self.node_index_map.get(target_id)?;
        Some(self.graph.add_edge(*source_idx, *target_idx, data))
    }

    /// Get all incoming edges for a node (edges where this node is the target)
    pub fn incoming_edges(&self, id: &str) -> impl Iterator<Item = (&Node, &EdgeData)> {
        self.directed_edges(id, Direction::Incoming)
    }

    /// Get all outgoing edges from a node (edges where this node is the source)
    pub fn outgoing_edges(&self, id: &str) -> impl Iterator<Item = (&Node, &EdgeData)> {
        self.directed_edges(id, Direction::Outgoing)
    }

    fn directed_edges(
        &self,
        id: &str,
        direction: Direction,
    ) -> impl Iterator<Item = (&Node, &EdgeData)> {
        let idx = self.node_index_map.get(id).copied();
        idx.into_iter().flat_map(move |idx| {
            self.graph
                .edges_directed(idx, direction)
                .filter_map(move |edge_ref| {
                    let other = match direction {
                        Direction::Incoming => edge_ref.source(),
                        Direction::Outgoing => edge_ref.target(),
                    };
                    Some((self.graph.node_weight(other)?, edge_ref.weight()))
                })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over all edges as owned `Edge` values.
    pub fn iter_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.graph.edge_references().filter_map(move |edge_ref| {
            let source = self.graph.node_weight(edge_ref.source())?;
            let target = self.graph.node_weight(edge_ref.target())?;
            let data = edge_ref.weight();
            Some(Edge {
                source: source.id.clone(),
                target: target.id.clone(),
                edge_type: data.edge_type,
                match_range: data.match_range,
            })
        })
    }

    pub fn edges_by_type(
        &self,
        edge_type: EdgeType,
    ) -> impl Iterator<Item = (&Node, &Node, &EdgeData)> {
        self.graph.edge_references().filter_map(move |edge_ref| {
            if edge_ref.weight().edge_type != edge_type {
                return None;
            }
            let source = self.graph.node_weight(edge_ref.source())?;
            let target = self.graph.node_weight(edge_ref.target())?;
            Some((source, target, edge_ref.weight()))
        })
    }

    /// Drop every edge whose type matches `pred`.
    pub fn remove_edges_where(&mut self, pred: impl Fn(&EdgeData) -> bool) -> usize {
        let doomed: Vec<EdgeIndex> = self
            .graph
            .edge_indices()
            .filter(|&e| self.graph.edge_weight(e).is_some_and(&pred))
            .collect();
        for edge in &doomed {
            self.graph.remove_edge(*edge);
        }
        doomed.len()
    }

    /// Count edges whose endpoints are missing from the id map.
    ///
    /// Always zero unless the map and the graph have diverged.
    pub fn dangling_edge_count(&self) -> usize {
        self.graph
            .edge_references()
            .filter(|edge_ref| {
                let known = |idx: NodeIndex| {
                    self.graph
                        .node_weight(idx)
                        .is_some_and(|n| self.node_index_map.get(&n.id) == Some(&idx))
                };
                !(known(edge_ref.source()) && known(edge_ref.target()))
            })
            .count()
    }

    // ------------------------------------------------------------------------
    // Traversal Operations
    // ------------------------------------------------------------------------

    /// Children (outgoing CONTAINS edges) in source order.
    pub fn children(&self, id: &str) -> Vec<&Node> {
        let mut children: Vec<&Node> = self
            .outgoing_edges(id)
            .filter(|(_, edge_data)| edge_data.edge_type == EdgeType::Contains)
            .map(|(node, _)| node)
            .collect();
        children.sort_by(|a, b| a.range.start.cmp(&b.range.start).then(a.id.cmp(&b.id)));
        children
    }

    /// Parent (incoming CONTAINS edge).
    pub fn parent(&self, id: &str) -> Option<&Node> {
        self.incoming_edges(id)
            .find(|(_, edge_data)| edge_data.edge_type == EdgeType::Contains)
            .map(|(node, _)| node)
    }

    /// `id` and every node reachable from it over CONTAINS edges.
    pub fn subtree(&self, id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(node) = self.get_node(&current) else {
                continue;
            };
            out.push(node);
            for child in self.children(&current).into_iter().rev() {
                stack.push(child.id.clone());
            }
        }
        out
    }

    /// Follow the IMPORTS edge of an Import node.
    pub fn import_target(&self, import_id: &str) -> Option<&Node> {
        self.outgoing_edges(import_id)
            .find(|(_, data)| data.edge_type == EdgeType::Imports)
            .map(|(node, _)| node)
    }

    // ------------------------------------------------------------------------
    // File Operations
    // ------------------------------------------------------------------------

    /// Remove all nodes owned by a file and their incident edges.
    pub fn remove_file_nodes(&mut self, file_path: &str) -> usize {
        let ids_to_remove: Vec<String> = self
            .graph
            .node_weights()
            .filter(|n| n.file == file_path)
            .map(|n| n.id.clone())
            .collect();

        for id in &ids_to_remove {
            self.remove_node(id);
        }
        ids_to_remove.len()
    }

    /// Remove ExternalModule sentinels nothing points at anymore.
    pub fn prune_orphan_externals(&mut self) -> usize {
        let orphans: Vec<String> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph[idx].is_external()
                    && self
                        .graph
                        .edges_directed(idx, Direction::Incoming)
                        .next()
                        .is_none()
            })
            .map(|idx| self.graph[idx].id.clone())
            .collect();
        for id in &orphans {
            self.remove_node(id);
        }
        orphans.len()
    }

    /// Sorted edge list, used to compare graphs structurally.
    pub fn edge_signature(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.iter_edges().collect();
        edges.sort();
        edges
    }
}
