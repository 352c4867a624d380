//! Tree-Sitter Parser Adapter
//!
//! Wraps tree-sitter behind a byte-addressed interface and supports
//! incremental re-parsing after a batch of text edits.
//!
//! ## Supported Languages
//!
//! - Python (.py, .pyi)
//! - JavaScript (.js, .mjs, .cjs, .jsx)
//! - TypeScript (.ts, .mts, .cts)
//! - TSX (.tsx)

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tree_sitter::{InputEdit, Language, Parser, Point, Tree};

// ============================================================================
// Supported Languages
// ============================================================================

/// Supported programming languages for parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedLanguage {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
}

impl SupportedLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedLanguage::Python => "python",
            SupportedLanguage::JavaScript => "javascript",
            SupportedLanguage::TypeScript => "typescript",
            SupportedLanguage::Tsx => "tsx",
        }
    }

    /// Get the tree-sitter Language for this language.
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            SupportedLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SupportedLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SupportedLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SupportedLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// JavaScript, TypeScript and TSX share one front-end and module rules.
    pub fn is_script(&self) -> bool {
        !matches!(self, SupportedLanguage::Python)
    }

    /// Whether two languages can import from each other.
    pub fn same_family(&self, other: SupportedLanguage) -> bool {
        self.is_script() == other.is_script()
    }

    /// Detect language from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    pub fn from_extension(ext: &str) -> Option<Self> {
        get_extension_map()
            .get(ext.to_lowercase().as_str())
            .copied()
    }

    /// Detect language from a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SupportedLanguage {
    type Err = ParserError;

    /// Parses a language hint. `typescript` covers TSX and JavaScript files too
    /// when used as a build filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(SupportedLanguage::Python),
            "javascript" | "js" => Ok(SupportedLanguage::JavaScript),
            "typescript" | "ts" => Ok(SupportedLanguage::TypeScript),
            "tsx" => Ok(SupportedLanguage::Tsx),
            other => Err(ParserError::UnsupportedLanguage(other.to_string())),
        }
    }
}

static EXTENSION_MAP: OnceLock<HashMap<&'static str, SupportedLanguage>> = OnceLock::new();

fn get_extension_map() -> &'static HashMap<&'static str, SupportedLanguage> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        // Python
        map.insert("py", SupportedLanguage::Python);
        map.insert("pyi", SupportedLanguage::Python);
        // JavaScript
        map.insert("js", SupportedLanguage::JavaScript);
        map.insert("mjs", SupportedLanguage::JavaScript);
        map.insert("cjs", SupportedLanguage::JavaScript);
        map.insert("jsx", SupportedLanguage::JavaScript);
        // TypeScript
        map.insert("ts", SupportedLanguage::TypeScript);
        map.insert("mts", SupportedLanguage::TypeScript);
        map.insert("cts", SupportedLanguage::TypeScript);
        map.insert("tsx", SupportedLanguage::Tsx);
        map
    })
}

// ============================================================================
// Parser Errors
// ============================================================================

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Failed to set language
    #[error("Failed to set language: {0}")]
    LanguageSet(String),

    /// Tree-sitter returned no tree (cancelled or timed out)
    #[error("Failed to parse source code")]
    ParseFailed,

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

// ============================================================================
// Edits
// ============================================================================

/// A replacement already applied to a file's text: bytes
/// `[start, old_end)` of the old text became `[start, start + new_len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedEdit {
    pub start: usize,
    pub old_end: usize,
    pub new_len: usize,
}

/// Row/column of a byte offset, columns counted in bytes.
pub fn point_at(text: &str, offset: usize) -> Point {
    let prefix = &text.as_bytes()[..offset.min(text.len())];
    let row = prefix.iter().filter(|&&b| b == b'\n').count();
    let column = match prefix.iter().rposition(|&b| b == b'\n') {
        Some(nl) => prefix.len() - nl - 1,
        None => prefix.len(),
    };
    Point::new(row, column)
}

/// Position reached after writing `inserted` starting at `start`.
fn advance_point(start: Point, inserted: &str) -> Point {
    let newlines = inserted.bytes().filter(|&b| b == b'\n').count();
    if newlines == 0 {
        Point::new(start.row, start.column + inserted.len())
    } else {
        let tail = inserted.len() - inserted.rfind('\n').map_or(0, |i| i + 1);
        Point::new(start.row + newlines, tail)
    }
}

/// Build the `InputEdit`s describing `edits` against `old_text`.
///
/// `edits` must be non-overlapping and ordered back-to-front (descending
/// start), the order they were applied in; `inserted` yields the new text
/// written by each edit in the same order. Positions are taken from the old
/// text because each edit only touches bytes after its predecessors' starts.
pub fn input_edits<'a>(
    old_text: &str,
    edits: &[AppliedEdit],
    inserted: impl IntoIterator<Item = &'a str>,
) -> Vec<InputEdit> {
    edits
        .iter()
        .zip(inserted)
        .map(|(edit, new_content)| {
            let start_position = point_at(old_text, edit.start);
            InputEdit {
                start_byte: edit.start,
                old_end_byte: edit.old_end,
                new_end_byte: edit.start + edit.new_len,
                start_position,
                old_end_position: point_at(old_text, edit.old_end),
                new_end_position: advance_point(start_position, new_content),
            }
        })
        .collect()
}

// ============================================================================
// Code Parser
// ============================================================================

/// A tree-sitter parser bound to one language.
pub struct CodeParser {
    parser: Parser,
    language: SupportedLanguage,
}

impl CodeParser {
    /// Create a new parser for the specified language.
    pub fn new(language: SupportedLanguage) -> Result<Self, ParserError> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.tree_sitter_language())
            .map_err(|e| ParserError::LanguageSet(e.to_string()))?;

        Ok(Self { parser, language })
    }

    pub fn language(&self) -> SupportedLanguage {
        self.language
    }

    /// Parse source code into a syntax tree.
    ///
    /// Syntax errors do not fail the parse; they surface as ERROR nodes.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParserError> {
        self.parser
            .parse(source, None)
            .ok_or(ParserError::ParseFailed)
    }

    /// Re-parse `new_text` incrementally.
    ///
    /// `old_tree` is the tree of the text before `edits` were applied; the
    /// edits are recorded on a copy of it so unchanged subtrees are reused.
    pub fn reparse(
        &mut self,
        old_tree: &Tree,
        edits: &[InputEdit],
        new_text: &str,
    ) -> Result<Tree, ParserError> {
        let mut tree = old_tree.clone();
        for edit in edits {
            tree.edit(edit);
        }
        self.parser
            .parse(new_text, Some(&tree))
            .ok_or(ParserError::ParseFailed)
    }
}

/// True when the tree contains ERROR or MISSING nodes.
pub fn has_syntax_errors(tree: &Tree) -> bool {
    tree.root_node().has_error()
}

// ============================================================================
// Tests
// ============================================================================
