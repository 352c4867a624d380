//! Import and symbol resolution.
//!
//! Every Import resolves to a terminal Symbol, File or ExternalModule
//! sentinel. Module specifiers are translated into candidate files by a
//! per-language [`ModuleRules`] implementation; names are then looked up in
//! the target file, hopping through re-exports and wildcard re-exports with a
//! visited set of `(file, name)` pairs so cyclic re-export chains terminate.
//!
//! Resolution never fails: anything that cannot be found, including a
//! closed re-export cycle, resolves to the ExternalModule sentinel of the
//! import's specifier.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::trace;

use crate::builder::SourceFile;
use crate::graph::external_node_id;
use crate::model::{ImportInfo, SymbolDef, SymbolKind};
use crate::parser::SupportedLanguage;
use crate::tsconfig::{join_normalized, join_path, parent_dir, ProjectConfigs};

// ============================================================================
// Resolution Results
// ============================================================================

/// Where an import ends up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedTarget {
    /// Node id of a symbol
    Symbol(String),
    /// Path of a file (module imports, wildcards, submodules)
    File(String),
    /// Module specifier with no local source
    External(String),
}

impl ResolvedTarget {
    pub fn node_id(&self) -> String {
        match self {
            ResolvedTarget::Symbol(id) | ResolvedTarget::File(id) => id.clone(),
            ResolvedTarget::External(specifier) => external_node_id(specifier),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ResolvedTarget::External(_))
    }
}

/// Outcome of resolving one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: ResolvedTarget,
    /// Any import or export clause along the chain renames
    pub aliased: bool,
    /// Number of imports traversed, including the first
    pub hops: usize,
    /// A re-export cycle closed before a definition was found
    pub cyclic: bool,
}

impl Resolution {
    fn external(specifier: &str, cyclic: bool) -> Self {
        Self {
            target: ResolvedTarget::External(specifier.to_string()),
            aliased: false,
            hops: 1,
            cyclic,
        }
    }

    fn file(path: String, aliased: bool) -> Self {
        Self {
            target: ResolvedTarget::File(path),
            aliased,
            hops: 1,
            cyclic: false,
        }
    }
}

/// Result of looking up a name exported by a file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Found(Resolution),
    Cycle,
    NotFound,
}

// ============================================================================
// Resolution Cache
// ============================================================================

/// Memoized resolutions keyed by `(import_id, epoch)`.
///
/// Entries from older epochs are never returned; [`ResolutionCache::evict_before`]
/// drops them.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    entries: HashMap<(String, u64), Resolution>,
    hits: usize,
    misses: usize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, import_id: &str, epoch: u64) -> Option<&Resolution> {
        let found = self.entries.get(&(import_id.to_string(), epoch));
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, import_id: &str, epoch: u64, resolution: Resolution) {
        self.entries.insert((import_id.to_string(), epoch), resolution);
    }

    pub fn get_or_insert_with(
        &mut self,
        import_id: &str,
        epoch: u64,
        resolve: impl FnOnce() -> Resolution,
    ) -> Resolution {
        if let Some(hit) = self.get(import_id, epoch) {
            return hit.clone();
        }
        let resolution = resolve();
        self.insert(import_id, epoch, resolution.clone());
        resolution
    }

    /// Drop entries older than `epoch`.
    pub fn evict_before(&mut self, epoch: u64) {
        self.entries.retain(|(_, e), _| *e >= epoch);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

// ============================================================================
// Module Rules
// ============================================================================

/// Per-language translation of module specifiers and export visibility.
pub trait ModuleRules: Send + Sync {
    fn name(&self) -> &'static str;

    /// The source file `specifier` refers to when imported from `importer`.
    fn module_file(&self, resolver: &Resolver<'_>, importer: &str, specifier: &str)
        -> Option<String>;

    /// Specifier of `name` imported as a submodule of `specifier`, for
    /// languages where `from pkg import sub` can name a module.
    fn submodule(&self, _specifier: &str, _name: &str) -> Option<String> {
        None
    }

    /// Whether plain (non re-export) imports are visible to importers.
    fn imports_are_exported(&self) -> bool;

    /// Whether a top-level definition is importable under `name`.
    fn exports_symbol(&self, symbol: &SymbolDef, name: &str) -> bool;
}

/// Python: dotted paths, packages and relative imports.
pub struct PythonRules;

/// TypeScript and JavaScript: relative paths, index files and project
/// config aliases.
pub struct ScriptRules;

static PYTHON_RULES: PythonRules = PythonRules;
static SCRIPT_RULES: ScriptRules = ScriptRules;

/// Rule set for `language`.
pub fn rules_for(language: SupportedLanguage) -> &'static dyn ModuleRules {
    match language {
        SupportedLanguage::Python => &PYTHON_RULES,
        SupportedLanguage::JavaScript | SupportedLanguage::TypeScript | SupportedLanguage::Tsx => {
            &SCRIPT_RULES
        }
    }
}

/// Directories tried, in order, for absolute Python imports.
const PYTHON_SOURCE_DIRS: &[&str] = &["src"];

impl PythonRules {
    fn candidates(base: &str) -> Vec<String> {
        if base.is_empty() {
            return vec!["__init__.py".to_string(), "__init__.pyi".to_string()];
        }
        vec![
            format!("{base}.py"),
            format!("{base}/__init__.py"),
            format!("{base}.pyi"),
            format!("{base}/__init__.pyi"),
        ]
    }
}

impl ModuleRules for PythonRules {
    fn name(&self) -> &'static str {
        "python"
    }

    fn module_file(&self, resolver: &Resolver<'_>, importer: &str, specifier: &str) -> Option<String> {
        let dots = specifier.chars().take_while(|&c| c == '.').count();
        let rel = specifier[dots..].replace('.', "/");

        if dots > 0 {
            // `.` is the importer's package, each further dot climbs one level.
            let mut dir = parent_dir(importer);
            for _ in 1..dots {
                if dir.is_empty() {
                    return None;
                }
                dir = parent_dir(&dir);
            }
            return resolver.first_existing(Self::candidates(&join_path(&dir, &rel)));
        }

        let importer_dir = parent_dir(importer);
        let mut bases = vec![String::new(), importer_dir];
        bases.extend(PYTHON_SOURCE_DIRS.iter().map(|d| d.to_string()));
        bases.dedup();
        bases
            .iter()
            .find_map(|base| resolver.first_existing(Self::candidates(&join_path(base, &rel))))
    }

    fn submodule(&self, specifier: &str, name: &str) -> Option<String> {
        if specifier.ends_with('.') {
            Some(format!("{specifier}{name}"))
        } else {
            Some(format!("{specifier}.{name}"))
        }
    }

    fn imports_are_exported(&self) -> bool {
        true
    }

    fn exports_symbol(&self, symbol: &SymbolDef, name: &str) -> bool {
        symbol.name == name
    }
}

/// Extensions tried after an extensionless specifier, in priority order.
pub const SCRIPT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts", ".js", ".jsx", ".mjs", ".cjs"];

impl ScriptRules {
    fn candidates(base: &str) -> Vec<String> {
        let mut out = vec![base.to_string()];
        out.extend(SCRIPT_EXTENSIONS.iter().map(|ext| format!("{base}{ext}")));
        // ESM-style `./util.js` written against a `util.ts` source
        for js in [".js", ".jsx", ".mjs", ".cjs"] {
            if let Some(stem) = base.strip_suffix(js) {
                out.extend([".ts", ".tsx", ".d.ts"].iter().map(|ext| format!("{stem}{ext}")));
            }
        }
        out.extend(
            SCRIPT_EXTENSIONS
                .iter()
                .map(|ext| join_path(base, &format!("index{ext}"))),
        );
        out
    }

    fn is_relative(specifier: &str) -> bool {
        specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
    }
}

impl ModuleRules for ScriptRules {
    fn name(&self) -> &'static str {
        "script"
    }

    fn module_file(&self, resolver: &Resolver<'_>, importer: &str, specifier: &str) -> Option<String> {
        if Self::is_relative(specifier) {
            let base = join_normalized(&parent_dir(importer), specifier)?;
            return resolver.first_existing(Self::candidates(&base));
        }
        if specifier.starts_with('/') {
            return None;
        }
        let config = resolver.configs.governing(importer)?;
        config
            .candidates(specifier)
            .iter()
            .find_map(|base| resolver.first_existing(Self::candidates(base)))
    }

    fn imports_are_exported(&self) -> bool {
        false
    }

    fn exports_symbol(&self, symbol: &SymbolDef, name: &str) -> bool {
        if name == "default" {
            symbol.info.is_default_export
        } else {
            symbol.info.is_exported && !symbol.info.is_default_export && symbol.name == name
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// A name bound in a file's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Index into the file's symbols
    Symbol(usize),
    /// Index into the file's imports
    Import(usize),
}

/// Resolves imports and names against a snapshot of parsed files.
pub struct Resolver<'a> {
    files: &'a BTreeMap<String, SourceFile>,
    configs: &'a ProjectConfigs,
}

impl<'a> Resolver<'a> {
    pub fn new(files: &'a BTreeMap<String, SourceFile>, configs: &'a ProjectConfigs) -> Self {
        Self { files, configs }
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn first_existing(&self, candidates: Vec<String>) -> Option<String> {
        candidates.into_iter().find(|c| self.has_file(c))
    }

    fn file(&self, path: &str) -> Option<&'a SourceFile> {
        self.files.get(path)
    }

    /// File the import's module specifier refers to.
    pub fn module_file(&self, file: &SourceFile, import: &ImportInfo) -> Option<String> {
        rules_for(file.language).module_file(self, &file.path, &import.module)
    }

    // ------------------------------------------------------------------------
    // Import Resolution
    // ------------------------------------------------------------------------

    /// Resolve `file`'s import at `import_index` to its terminal target.
    pub fn resolve(&self, file: &str, import_index: usize) -> Resolution {
        let mut visited = HashSet::new();
        let resolution = self.resolve_import(file, import_index, &mut visited);
        trace!(
            "resolved {}#{} -> {} ({} hops{})",
            file,
            import_index,
            resolution.target.node_id(),
            resolution.hops,
            if resolution.cyclic { ", cyclic" } else { "" }
        );
        resolution
    }

    fn resolve_import(
        &self,
        path: &str,
        import_index: usize,
        visited: &mut HashSet<(String, String)>,
    ) -> Resolution {
        let Some(file) = self.file(path) else {
            return Resolution::external("", false);
        };
        let Some(import) = file.model.imports.get(import_index) else {
            return Resolution::external("", false);
        };
        let module_file = self.module_file(file, import);

        let Some(name) = import.imported_name.as_deref().filter(|_| {
            !import.is_module_import && !import.is_wildcard
        }) else {
            return match module_file {
                Some(target) => Resolution::file(target, import.is_aliased()),
                None => Resolution::external(&import.module, false),
            };
        };

        let lookup = match &module_file {
            Some(target) => self.lookup_export(target, name, visited),
            None => Lookup::NotFound,
        };
        match lookup {
            Lookup::Found(found) => Resolution {
                aliased: found.aliased || import.is_aliased(),
                hops: found.hops + 1,
                ..found
            },
            miss => {
                if let Some(sub) = self.submodule_file(file, import, name) {
                    return Resolution::file(sub, import.is_aliased());
                }
                Resolution::external(&import.module, miss == Lookup::Cycle)
            }
        }
    }

    fn submodule_file(&self, file: &SourceFile, import: &ImportInfo, name: &str) -> Option<String> {
        let rules = rules_for(file.language);
        let specifier = rules.submodule(&import.module, name)?;
        rules.module_file(self, &file.path, &specifier)
    }

    /// Look up `name` as exported by `path`.
    ///
    /// Order: local definitions (and export clauses), then import bindings,
    /// then wildcard re-exports in source order. The first wildcard that
    /// yields the name wins.
    fn lookup_export(
        &self,
        path: &str,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Lookup {
        if !visited.insert((path.to_string(), name.to_string())) {
            return Lookup::Cycle;
        }
        let Some(file) = self.file(path) else {
            return Lookup::NotFound;
        };
        let rules = rules_for(file.language);

        if let Some(index) = self.exported_symbol(file, name) {
            return Lookup::Found(Resolution {
                target: ResolvedTarget::Symbol(file.symbol_ids[index].clone()),
                aliased: false,
                hops: 0,
                cyclic: false,
            });
        }

        // `export { local as name }` / `export default local`
        if let Some(export) = file.model.exports.iter().find(|e| e.exported == name) {
            let renamed = export.exported != export.local;
            if let Some(index) = file.top_level_symbol(&export.local) {
                return Lookup::Found(Resolution {
                    target: ResolvedTarget::Symbol(file.symbol_ids[index].clone()),
                    aliased: renamed,
                    hops: 0,
                    cyclic: false,
                });
            }
            if let Some(index) = self.import_binding(file, &export.local, true) {
                return self.through_import(file, index, renamed, visited);
            }
        }

        if let Some(index) = self.import_binding(file, name, rules.imports_are_exported()) {
            return self.through_import(file, index, false, visited);
        }

        let mut saw_cycle = false;
        for import in file.model.imports.iter().filter(|i| i.is_wildcard) {
            let Some(target) = self.module_file(file, import) else {
                continue;
            };
            match self.lookup_export(&target, name, visited) {
                Lookup::Found(found) => {
                    return Lookup::Found(Resolution {
                        hops: found.hops + 1,
                        ..found
                    })
                }
                Lookup::Cycle => saw_cycle = true,
                Lookup::NotFound => {}
            }
        }
        if saw_cycle {
            Lookup::Cycle
        } else {
            Lookup::NotFound
        }
    }

    fn through_import(
        &self,
        file: &SourceFile,
        import_index: usize,
        renamed: bool,
        visited: &mut HashSet<(String, String)>,
    ) -> Lookup {
        let resolution = self.resolve_import(&file.path, import_index, visited);
        if resolution.cyclic {
            return Lookup::Cycle;
        }
        Lookup::Found(Resolution {
            aliased: resolution.aliased || renamed,
            ..resolution
        })
    }

    /// Top-level definition importable as `name`.
    fn exported_symbol(&self, file: &SourceFile, name: &str) -> Option<usize> {
        let rules = rules_for(file.language);
        file.model
            .top_level()
            .find(|&i| rules.exports_symbol(&file.model.symbols[i], name))
    }

    /// Non-wildcard import binding `name`; re-exports only bind for lookups
    /// from other files.
    fn import_binding(&self, file: &SourceFile, name: &str, include_plain: bool) -> Option<usize> {
        file.model.imports.iter().position(|import| {
            !import.is_wildcard
                && (include_plain || import.is_reexport)
                && import.binding() == name
        })
    }

    // ------------------------------------------------------------------------
    // First Hop
    // ------------------------------------------------------------------------

    /// Node the import statement names directly: a symbol or import in the
    /// target file, found through wildcards if needed.
    ///
    /// Falls back to the terminal resolution when the name is not defined or
    /// re-bound anywhere.
    pub fn first_hop(&self, file: &str, import_index: usize) -> String {
        let hop = self.file(file).and_then(|source| {
            let import = source.model.imports.get(import_index)?;
            if import.is_module_import || import.is_wildcard {
                return None;
            }
            let name = import.imported_name.as_deref()?;
            let target = self.module_file(source, import)?;
            self.first_hop_in(&target, name, &mut HashSet::new())
        });
        hop.unwrap_or_else(|| self.resolve(file, import_index).target.node_id())
    }

    fn first_hop_in(&self, path: &str, name: &str, visited: &mut HashSet<String>) -> Option<String> {
        if !visited.insert(path.to_string()) {
            return None;
        }
        let file = self.file(path)?;
        let rules = rules_for(file.language);

        if let Some(index) = self.exported_symbol(file, name) {
            return Some(file.symbol_ids[index].clone());
        }
        if let Some(export) = file.model.exports.iter().find(|e| e.exported == name) {
            if let Some(index) = file.top_level_symbol(&export.local) {
                return Some(file.symbol_ids[index].clone());
            }
            if let Some(index) = self.import_binding(file, &export.local, true) {
                return Some(file.import_ids[index].clone());
            }
        }
        if let Some(index) = self.import_binding(file, name, rules.imports_are_exported()) {
            return Some(file.import_ids[index].clone());
        }
        file.model
            .imports
            .iter()
            .filter(|i| i.is_wildcard)
            .filter_map(|import| self.module_file(file, import))
            .find_map(|target| self.first_hop_in(&target, name, visited))
    }

    // ------------------------------------------------------------------------
    // Scope Lookup
    // ------------------------------------------------------------------------

    /// What `name` refers to at `offset` inside `file`.
    ///
    /// Nested definitions of enclosing functions come first, then locals
    /// (which shadow and yield `None`), then top-level definitions, then
    /// import bindings. `chain` picks between several `import a.x` /
    /// `import a.y` statements binding the same `a`.
    pub fn lookup_scope(
        &self,
        file: &SourceFile,
        name: &str,
        offset: usize,
        chain: &[&str],
    ) -> Option<Binding> {
        let model = &file.model;

        let mut enclosing: Vec<usize> = model
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind().is_callable() && s.range.contains_offset(offset))
            .map(|(i, _)| i)
            .collect();
        enclosing.sort_by_key(|&i| std::cmp::Reverse(model.symbols[i].range.start));
        for scope in enclosing {
            let nested = model.symbols.iter().position(|s| {
                s.parent == Some(scope)
                    && s.name == name
                    && !matches!(s.kind(), SymbolKind::Parameter | SymbolKind::Decorator)
            });
            if let Some(index) = nested {
                return Some(Binding::Symbol(index));
            }
        }

        if model.is_shadowed(name, offset) {
            return None;
        }

        if let Some(index) = file.top_level_symbol(name) {
            return Some(Binding::Symbol(index));
        }

        let bindings: Vec<usize> = model
            .imports
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.is_wildcard && !i.is_reexport && i.binding() == name)
            .map(|(index, _)| index)
            .collect();
        let best = bindings
            .iter()
            .copied()
            .find(|&index| {
                let path = module_path_tail(&model.imports[index]);
                !path.is_empty() && chain.starts_with(&path)
            })
            .or_else(|| bindings.first().copied());
        if let Some(index) = best {
            return Some(Binding::Import(index));
        }

        // Names pulled in by `from m import *` in Python
        if rules_for(file.language).imports_are_exported() {
            let mut visited = HashSet::new();
            for (index, import) in model.imports.iter().enumerate() {
                if !import.is_wildcard {
                    continue;
                }
                let Some(target) = self.module_file(file, import) else {
                    continue;
                };
                if matches!(self.lookup_export(&target, name, &mut visited), Lookup::Found(_)) {
                    return Some(Binding::Import(index));
                }
            }
        }
        None
    }

    /// Resolve `name` as a member of a wildcard import's target, for
    /// references bound through `from m import *`.
    pub fn wildcard_member(&self, file: &SourceFile, import_index: usize, name: &str) -> Option<Resolution> {
        let import = file.model.imports.get(import_index)?;
        let target = self.module_file(file, import)?;
        match self.lookup_export(&target, name, &mut HashSet::new()) {
            Lookup::Found(found) => Some(Resolution {
                hops: found.hops + 1,
                ..found
            }),
            _ => None,
        }
    }

    /// Resolve `name` as an attribute of the module at `path`.
    pub fn module_member(&self, path: &str, name: &str) -> Option<Resolution> {
        match self.lookup_export(path, name, &mut HashSet::new()) {
            Lookup::Found(found) => Some(found),
            _ => {
                // `pkg.sub` where `sub` is a submodule of the package file
                let file = self.file(path)?;
                let rules = rules_for(file.language);
                if !rules.imports_are_exported() {
                    return None;
                }
                let dir = if path.ends_with("/__init__.py") || path.ends_with("/__init__.pyi") {
                    parent_dir(path)
                } else {
                    return None;
                };
                let sub = PythonRules::candidates(&join_path(&dir, name));
                self.first_existing(sub).map(|f| Resolution::file(f, false))
            }
        }
    }

    /// Symbol id of the child of `symbol_id`'s definition named `name`.
    pub fn class_member(&self, symbol_id: &str, name: &str) -> Option<String> {
        let path = symbol_id.split(':').next()?;
        let file = self.file(path)?;
        let owner = file.symbol_ids.iter().position(|id| id == symbol_id)?;
        if file.model.symbols[owner].kind() != SymbolKind::Class {
            return None;
        }
        file.model
            .symbols
            .iter()
            .enumerate()
            .find(|(_, s)| s.parent == Some(owner) && s.name == name)
            .map(|(i, _)| file.symbol_ids[i].clone())
    }
}

/// Dotted segments of an un-aliased module import after the bound name:
/// `import a.b.c` → `["b", "c"]`.
pub fn module_path_tail(import: &ImportInfo) -> Vec<&str> {
    if import.is_module_import && import.alias_range.is_none() {
        import.alias.split('.').skip(1).collect()
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CodeParser;
    use pretty_assertions::assert_eq;

    fn files(sources: &[(&str, &str)]) -> BTreeMap<String, SourceFile> {
        sources
            .iter()
            .map(|(path, text)| {
                let language = SupportedLanguage::from_path(std::path::Path::new(path)).unwrap();
                let mut parser = CodeParser::new(language).unwrap();
                let file = SourceFile::parse(&mut parser, *path, text.to_string()).unwrap();
                (path.to_string(), file)
            })
            .collect()
    }

    fn resolve(files: &BTreeMap<String, SourceFile>, path: &str, alias: &str) -> Resolution {
        let configs = ProjectConfigs::default();
        let resolver = Resolver::new(files, &configs);
        let index = files[path]
            .model
            .imports
            .iter()
            .position(|i| i.alias == alias)
            .unwrap();
        resolver.resolve(path, index)
    }

    #[test]
    fn test_python_relative_import() {
        let files = files(&[
            ("pkg/__init__.py", ""),
            ("pkg/models.py", "class User:\n    pass\n"),
            ("pkg/api/views.py", "from ..models import User as U\n"),
        ]);
        let res = resolve(&files, "pkg/api/views.py", "U");
        assert_eq!(res.target, ResolvedTarget::Symbol("pkg/models.py:User".into()));
        assert!(res.aliased);
        assert_eq!(res.hops, 1);
    }

    #[test]
    fn test_python_reexport_chain_and_submodule_fallback() {
        let files = files(&[
            ("lib/__init__.py", "from .core import helper\n"),
            ("lib/core.py", "def helper():\n    pass\n"),
            ("lib/extra.py", "X = 1\n"),
            ("app.py", "from lib import helper\nfrom lib import extra\n"),
        ]);
        let res = resolve(&files, "app.py", "helper");
        assert_eq!(res.target, ResolvedTarget::Symbol("lib/core.py:helper".into()));
        assert_eq!(res.hops, 2);
        assert!(!res.aliased);

        let res = resolve(&files, "app.py", "extra");
        assert_eq!(res.target, ResolvedTarget::File("lib/extra.py".into()));
    }

    #[test]
    fn test_unresolvable_import_is_external() {
        let files = files(&[("a.py", "import requests\nfrom x import missing\n")]);
        assert_eq!(
            resolve(&files, "a.py", "requests").target,
            ResolvedTarget::External("requests".into())
        );
        assert_eq!(
            resolve(&files, "a.py", "missing").target.node_id(),
            "external:x"
        );
    }

    #[test]
    fn test_circular_reexport_terminates_as_external() {
        let files = files(&[
            ("x.py", "from y import foo\n"),
            ("y.py", "from x import foo\n"),
        ]);
        let res = resolve(&files, "x.py", "foo");
        assert!(res.cyclic);
        assert_eq!(res.target, ResolvedTarget::External("y".into()));
    }

    #[test]
    fn test_script_index_and_wildcard_reexport() {
        let files = files(&[
            ("src/util/index.ts", "export * from './math';\nexport * from './strings';\n"),
            ("src/util/math.ts", "export function add(a: number, b: number) { return a + b; }\n"),
            ("src/util/strings.ts", "export function add() {}\n"),
            ("src/app.ts", "import { add } from './util';\n"),
        ]);
        let res = resolve(&files, "src/app.ts", "add");
        // first wildcard wins
        assert_eq!(res.target, ResolvedTarget::Symbol("src/util/math.ts:add".into()));

        let configs = ProjectConfigs::default();
        let resolver = Resolver::new(&files, &configs);
        assert_eq!(resolver.first_hop("src/app.ts", 0), "src/util/math.ts:add");
    }

    #[test]
    fn test_script_export_clause_and_default() {
        let files = files(&[
            (
                "lib.ts",
                "function inner() {}\nexport { inner as outer };\nexport default class Widget {}\n",
            ),
            ("main.ts", "import W, { outer } from './lib';\n"),
        ]);
        let res = resolve(&files, "main.ts", "outer");
        assert_eq!(res.target, ResolvedTarget::Symbol("lib.ts:inner".into()));
        assert!(res.aliased);

        let res = resolve(&files, "main.ts", "W");
        assert_eq!(res.target, ResolvedTarget::Symbol("lib.ts:Widget".into()));
    }

    #[test]
    fn test_unexported_script_symbol_is_not_importable() {
        let files = files(&[
            ("lib.ts", "function hidden() {}\n"),
            ("main.ts", "import { hidden } from './lib';\n"),
        ]);
        assert!(resolve(&files, "main.ts", "hidden").target.is_external());
    }

    #[test]
    fn test_cache_is_keyed_by_epoch() {
        let mut cache = ResolutionCache::new();
        let res = Resolution::file("a.py".into(), false);
        cache.insert("b.py:<import>:a", 1, res.clone());
        assert_eq!(cache.get("b.py:<import>:a", 1), Some(&res));
        assert_eq!(cache.get("b.py:<import>:a", 2), None);

        cache.evict_before(2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_lookup_scope_respects_shadowing() {
        let files = files(&[(
            "m.py",
            "def foo():\n    pass\n\ndef bar(foo):\n    return foo\n\ndef baz():\n    return foo()\n",
        )]);
        let configs = ProjectConfigs::default();
        let resolver = Resolver::new(&files, &configs);
        let file = &files["m.py"];
        let text = &file.text;

        let shadowed = text.find("return foo").unwrap() + 7;
        assert_eq!(resolver.lookup_scope(file, "foo", shadowed, &[]), None);

        let global = text.rfind("foo()").unwrap();
        assert_eq!(resolver.lookup_scope(file, "foo", global, &[]), Some(Binding::Symbol(0)));
    }
}
