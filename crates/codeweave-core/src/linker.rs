//! Cross-file edges.
//!
//! After every build, commit or reset the derived edges (IMPORTS, USES,
//! SUBCLASS_OF) are dropped and recomputed from the parsed files:
//!
//! - each Import gets an IMPORTS edge to its terminal resolution and a DIRECT
//!   USES edge to the node its statement names (its first hop);
//! - each reference site gets a USES edge from its enclosing scope to the
//!   local definition or import binding it names, plus CHAINED edges for
//!   attribute accesses that resolve through a module or class;
//! - superclass references between classes add SUBCLASS_OF edges.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::builder::SourceFile;
use crate::graph::{CodeGraph, EdgeData, EdgeType, Node};
use crate::model::{ByteRange, ReferenceContext, ReferenceSite, SymbolKind};
use crate::resolver::{module_path_tail, Binding, Resolution, ResolutionCache, ResolvedTarget, Resolver};
use crate::tsconfig::ProjectConfigs;
use crate::usage::UsageType;

/// Counts from one linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub imports: usize,
    /// Imports whose terminal is a local symbol or file
    pub resolved_imports: usize,
    pub uses_edges: usize,
    pub subclass_edges: usize,
}

/// Recompute every derived edge of `graph` for `epoch`.
pub fn link(
    graph: &mut CodeGraph,
    files: &BTreeMap<String, SourceFile>,
    configs: &ProjectConfigs,
    cache: &mut ResolutionCache,
    epoch: u64,
) -> LinkStats {
    let removed = graph.remove_edges_where(|e| e.edge_type.is_derived());
    trace!("dropped {} derived edges", removed);

    let mut linker = Linker {
        graph,
        resolver: Resolver::new(files, configs),
        cache,
        epoch,
        stats: LinkStats::default(),
    };
    for file in files.values() {
        linker.link_imports(file);
    }
    for file in files.values() {
        linker.link_references(file);
        linker.link_exports(file);
    }
    let stats = linker.stats;

    let pruned = graph.prune_orphan_externals();
    debug!(
        "linked {} imports ({} resolved), {} uses, {} subclass edges; pruned {} externals",
        stats.imports, stats.resolved_imports, stats.uses_edges, stats.subclass_edges, pruned
    );
    stats
}

/// What a reference or attribute chain currently points at.
enum Cursor {
    Symbol(String),
    File(String),
}

struct Linker<'g, 'f> {
    graph: &'g mut CodeGraph,
    resolver: Resolver<'f>,
    cache: &'g mut ResolutionCache,
    epoch: u64,
    stats: LinkStats,
}

impl Linker<'_, '_> {
    fn resolution(&mut self, file: &SourceFile, import_index: usize) -> Resolution {
        let resolver = &self.resolver;
        self.cache
            .get_or_insert_with(&file.import_ids[import_index], self.epoch, || {
                resolver.resolve(&file.path, import_index)
            })
    }

    /// Make sure the node for `target` exists, creating ExternalModule
    /// sentinels on demand.
    fn ensure_node(&mut self, target: &ResolvedTarget) -> Option<String> {
        let id = target.node_id();
        if !self.graph.contains_node(&id) {
            match target {
                ResolvedTarget::External(specifier) => {
                    self.graph.add_node(Node::external(specifier));
                }
                _ => return None,
            }
        }
        Some(id)
    }

    fn add_uses(&mut self, source: &str, target: &str, usage_type: UsageType, range: ByteRange) {
        if self
            .graph
            .add_edge(source, target, EdgeData::uses(usage_type, range))
            .is_some()
        {
            self.stats.uses_edges += 1;
        }
    }

    fn link_imports(&mut self, file: &SourceFile) {
        for (index, import) in file.model.imports.iter().enumerate() {
            self.stats.imports += 1;
            let import_id = file.import_ids[index].clone();
            let resolution = self.resolution(file, index);
            if !resolution.target.is_external() {
                self.stats.resolved_imports += 1;
            }
            let Some(terminal) = self.ensure_node(&resolution.target) else {
                continue;
            };
            let classification = if resolution.aliased {
                UsageType::ALIASED
            } else {
                UsageType::INDIRECT
            };
            self.graph
                .add_edge(&import_id, &terminal, EdgeData::imports(classification));

            let hop = self.resolver.first_hop(&file.path, index);
            if self.graph.contains_node(&hop) {
                let range = import
                    .name_range
                    .or(import.alias_range)
                    .or(import.module_range)
                    .unwrap_or(import.statement_range);
                self.add_uses(&import_id, &hop, UsageType::DIRECT, range);
            }
        }
    }

    fn link_references(&mut self, file: &SourceFile) {
        for site in &file.model.references {
            let scope = file.model.enclosing_scope(site.range.start);
            let source = scope.map_or(file.path.as_str(), |i| file.symbol_ids[i].as_str());
            let chain: Vec<&str> = site.chain.iter().map(|(name, _)| name.as_str()).collect();

            let Some(binding) = self
                .resolver
                .lookup_scope(file, &site.name, site.range.start, &chain)
            else {
                continue;
            };

            let (cursor, skip) = match binding {
                Binding::Symbol(index) => {
                    let target = file.symbol_ids[index].clone();
                    self.add_uses(source, &target, UsageType::DIRECT, site.range);
                    (Some(Cursor::Symbol(target)), 0)
                }
                Binding::Import(index) => self.link_import_reference(file, index, source, site),
            };

            let Some(cursor) = cursor else {
                continue;
            };
            let last = self.link_chain(source, cursor, &site.chain[skip.min(site.chain.len())..]);

            if site.context == ReferenceContext::Superclass {
                let is_class_scope =
                    scope.is_some_and(|i| file.model.symbols[i].kind() == SymbolKind::Class);
                if let Some(Cursor::Symbol(base)) = last {
                    let base_is_class = self.graph.get_node(&base).is_some_and(|n| {
                        matches!(n.symbol_kind(), Some(SymbolKind::Class | SymbolKind::Interface))
                    });
                    if is_class_scope && base_is_class && base != source {
                        self.graph
                            .add_edge(source, &base, EdgeData::subclass_of(Some(site.range)));
                        self.stats.subclass_edges += 1;
                    }
                }
            }
        }
    }

    /// Edge for a reference bound by an import; returns where the chain
    /// continues and how many chain segments the module path consumed.
    fn link_import_reference(
        &mut self,
        file: &SourceFile,
        index: usize,
        source: &str,
        site: &ReferenceSite,
    ) -> (Option<Cursor>, usize) {
        let import = &file.model.imports[index];

        if import.is_wildcard {
            // `from m import *`: the name itself is resolved inside `m`.
            let Some(found) = self.resolver.wildcard_member(file, index, &site.name) else {
                return (None, 0);
            };
            let cursor = match found.target {
                ResolvedTarget::Symbol(id) => {
                    let usage = if found.aliased {
                        UsageType::ALIASED
                    } else {
                        UsageType::INDIRECT
                    };
                    self.add_uses(source, &id, usage, site.range);
                    Some(Cursor::Symbol(id))
                }
                ResolvedTarget::File(path) => Some(Cursor::File(path)),
                ResolvedTarget::External(_) => None,
            };
            return (cursor, 0);
        }

        let import_id = file.import_ids[index].clone();
        self.add_uses(source, &import_id, UsageType::DIRECT, site.range);

        let tail = module_path_tail(import);
        let chain: Vec<&str> = site.chain.iter().map(|(name, _)| name.as_str()).collect();
        if !tail.is_empty() && !chain.starts_with(&tail) {
            return (None, 0);
        }

        let cursor = match self.resolution(file, index).target {
            ResolvedTarget::Symbol(id) => Some(Cursor::Symbol(id)),
            ResolvedTarget::File(path) => Some(Cursor::File(path)),
            ResolvedTarget::External(_) => None,
        };
        (cursor, tail.len())
    }

    /// Follow `a.b.c` through modules and classes, adding CHAINED edges.
    fn link_chain(
        &mut self,
        source: &str,
        mut cursor: Cursor,
        chain: &[(String, ByteRange)],
    ) -> Option<Cursor> {
        for (name, range) in chain {
            let next = match &cursor {
                Cursor::File(path) => match self.resolver.module_member(path, name) {
                    Some(Resolution {
                        target: ResolvedTarget::Symbol(id),
                        ..
                    }) => Cursor::Symbol(id),
                    Some(Resolution {
                        target: ResolvedTarget::File(path),
                        ..
                    }) => Cursor::File(path),
                    _ => return None,
                },
                Cursor::Symbol(id) => match self.resolver.class_member(id, name) {
                    Some(member) => Cursor::Symbol(member),
                    None => return None,
                },
            };
            if let Cursor::Symbol(id) = &next {
                self.add_uses(source, id, UsageType::CHAINED, *range);
            }
            cursor = next;
        }
        Some(cursor)
    }

    /// `export { local }` and `export default local` use their local binding.
    fn link_exports(&mut self, file: &SourceFile) {
        for export in &file.model.exports {
            let target = match file.top_level_symbol(&export.local) {
                Some(index) => file.symbol_ids[index].clone(),
                None => match file
                    .model
                    .imports
                    .iter()
                    .position(|i| !i.is_wildcard && !i.is_reexport && i.binding() == export.local)
                {
                    Some(index) => file.import_ids[index].clone(),
                    None => continue,
                },
            };
            self.add_uses(&file.path, &target, UsageType::DIRECT, export.local_range);
        }
    }
}

/// Count of USES edges by classification, for summaries.
pub fn uses_breakdown(graph: &CodeGraph) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for (_, _, data) in graph.edges_by_type(EdgeType::Uses) {
        let key = data.usage_type.unwrap_or_default().to_string();
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}
