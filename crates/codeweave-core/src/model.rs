//! Semantic model extracted from one source file.
//!
//! A language front-end walks a syntax tree once and produces a [`FileModel`]:
//! the symbols it defines, the imports it declares, the export clauses it
//! carries, and every identifier reference site. All positions are byte
//! offsets into the file's text at the time it was parsed.

use serde::{Deserialize, Serialize};

// ============================================================================
// Byte Ranges
// ============================================================================

/// Half-open byte range `[start, end)` into a file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        Self { start, end }
    }

    /// Zero-width range at `offset`.
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `other` lies entirely within `self`.
    pub fn contains(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// True when the two ranges share at least one byte.
    ///
    /// Zero-width ranges never overlap anything; touching boundaries do not
    /// count as overlap.
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &ByteRange) -> ByteRange {
        ByteRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

impl From<std::ops::Range<usize>> for ByteRange {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// Kinds of named definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    #[default]
    GlobalVar,
    Attribute,
    Parameter,
    Decorator,
    Interface,
    TypeAlias,
    Enum,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::GlobalVar => "global_var",
            SymbolKind::Attribute => "attribute",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Decorator => "decorator",
            SymbolKind::Interface => "interface",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Enum => "enum",
        }
    }

    /// Kinds that own a body of code and can originate usages.
    ///
    /// Parameters, decorators and attributes are attributed to the symbol
    /// that owns them.
    pub fn is_usage_scope(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Function
                | SymbolKind::Method
                | SymbolKind::GlobalVar
                | SymbolKind::Interface
                | SymbolKind::TypeAlias
                | SymbolKind::Enum
        )
    }

    /// Kinds that introduce a function scope where locals shadow globals.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attributes of a symbol that live on its graph node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub kind: SymbolKind,
    /// Range plus leading decorators, `export` keyword and attached comments
    pub extended_range: ByteRange,
    pub name_range: Option<ByteRange>,
    pub body_range: Option<ByteRange>,
    pub docstring_range: Option<ByteRange>,
    pub comment_range: Option<ByteRange>,
    /// Decorator names without the `@` and call arguments
    pub decorators: Vec<String>,
    /// Base class names as written in the class header
    pub superclasses: Vec<String>,
    pub is_exported: bool,
    pub is_default_export: bool,
    pub is_async: bool,
}

/// A definition found by a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDef {
    pub name: String,
    /// Index of the owning symbol in [`FileModel::symbols`]; `None` at top level
    pub parent: Option<usize>,
    pub range: ByteRange,
    pub info: SymbolInfo,
    /// Names bound inside a function scope (parameters, local assignments)
    pub locals: Vec<String>,
}

impl SymbolDef {
    pub fn new(name: impl Into<String>, kind: SymbolKind, range: ByteRange) -> Self {
        Self {
            name: name.into(),
            parent: None,
            range,
            info: SymbolInfo {
                kind,
                extended_range: range,
                ..Default::default()
            },
            locals: Vec::new(),
        }
    }

    pub fn kind(&self) -> SymbolKind {
        self.info.kind
    }
}

// ============================================================================
// Imports and Exports
// ============================================================================

/// One imported binding.
///
/// `import a.b` and `import * as ns from "x"` are module imports;
/// `from m import *` and `export * from "x"` are wildcards; `export { a } from
/// "x"` is a re-export.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Module specifier as written (`..pkg.mod`, `./util`, `@app/core`)
    pub module: String,
    /// Name imported from the module; `None` for module and wildcard imports
    pub imported_name: Option<String>,
    /// Local binding name (for re-exports, the exported name)
    pub alias: String,
    pub name_range: Option<ByteRange>,
    pub alias_range: Option<ByteRange>,
    pub module_range: Option<ByteRange>,
    pub statement_range: ByteRange,
    pub is_wildcard: bool,
    pub is_reexport: bool,
    pub is_module_import: bool,
    pub is_type_only: bool,
}

impl ImportInfo {
    /// True when the local name differs from the imported one.
    pub fn is_aliased(&self) -> bool {
        match &self.imported_name {
            Some(name) => name != &self.alias,
            None => self.is_module_import && self.alias_range.is_some(),
        }
    }

    /// The identifier this import binds in its file's scope.
    ///
    /// `import a.b.c` binds `a`; everything else binds its alias.
    pub fn binding(&self) -> &str {
        if self.is_module_import && self.alias_range.is_none() {
            self.alias.split('.').next().unwrap_or(&self.alias)
        } else {
            &self.alias
        }
    }

    /// Key used to build the import's node id.
    pub fn id_key(&self) -> String {
        if self.is_wildcard {
            format!("*{}", self.module)
        } else {
            self.alias.clone()
        }
    }
}

/// `export { local as exported }` without a source module, or
/// `export default <identifier>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDef {
    pub exported: String,
    pub local: String,
    pub local_range: ByteRange,
}

// ============================================================================
// References
// ============================================================================

/// Syntactic position a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceContext {
    Value,
    Call,
    Type,
    Superclass,
    Decorator,
}

/// An identifier use, possibly followed by attribute accesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSite {
    pub name: String,
    pub range: ByteRange,
    /// Trailing attribute names with their ranges (`a.b.c` → `[b, c]`)
    pub chain: Vec<(String, ByteRange)>,
    pub context: ReferenceContext,
}

impl ReferenceSite {
    pub fn new(name: impl Into<String>, range: ByteRange, context: ReferenceContext) -> Self {
        Self {
            name: name.into(),
            range,
            chain: Vec::new(),
            context,
        }
    }
}

// ============================================================================
// File Model
// ============================================================================

/// Everything a front-end extracts from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileModel {
    /// Definitions in source order; parents precede their children
    pub symbols: Vec<SymbolDef>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportDef>,
    pub references: Vec<ReferenceSite>,
    /// Whether the tree contained ERROR or MISSING nodes
    pub has_errors: bool,
}

impl FileModel {
    /// Indices of top-level symbols, in source order.
    pub fn top_level(&self) -> impl Iterator<Item = usize> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent.is_none())
            .map(|(i, _)| i)
    }

    /// Names from `containing` up to the root, outermost first.
    pub fn containment_path(&self, index: usize) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cursor = self.symbols[index].parent;
        while let Some(parent) = cursor {
            path.push(self.symbols[parent].name.as_str());
            cursor = self.symbols[parent].parent;
        }
        path.reverse();
        path
    }

    /// Index of the innermost symbol that may own a usage at `offset`.
    pub fn enclosing_scope(&self, offset: usize) -> Option<usize> {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind().is_usage_scope())
            .filter(|(_, s)| s.info.extended_range.contains_offset(offset))
            .max_by_key(|(_, s)| s.info.extended_range.start)
            .map(|(i, _)| i)
    }

    /// True when `name` is bound locally in any callable enclosing `offset`.
    pub fn is_shadowed(&self, name: &str, offset: usize) -> bool {
        self.symbols.iter().any(|s| {
            s.kind().is_callable()
                && s.range.contains_offset(offset)
                && s.locals.iter().any(|local| local == name)
        })
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

/// Anything with a name and a name token.
pub trait HasName {
    fn name(&self) -> &str;
    fn name_range(&self) -> Option<ByteRange>;
}

/// Definitions with a body block.
pub trait HasBody {
    fn body_range(&self) -> Option<ByteRange>;
}

/// Definitions that can carry decorators.
pub trait HasDecorators {
    fn decorators(&self) -> &[String];

    fn has_decorator(&self, name: &str) -> bool {
        self.decorators().iter().any(|d| d == name)
    }
}

impl HasName for SymbolDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn name_range(&self) -> Option<ByteRange> {
        self.info.name_range
    }
}

impl HasBody for SymbolDef {
    fn body_range(&self) -> Option<ByteRange> {
        self.info.body_range
    }
}

impl HasDecorators for SymbolDef {
    fn decorators(&self) -> &[String] {
        &self.info.decorators
    }
}
