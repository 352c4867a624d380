//! Language front-ends.
//!
//! Each front-end turns a tree-sitter [`Tree`] into a [`FileModel`] in a
//! single walk. Everything downstream (graph building, resolution, usage
//! computation) works on the model and never inspects syntax nodes, so a new
//! language only needs a [`LanguageFrontend`] implementation here and a
//! module rule set in [`crate::resolver`].

pub mod python;
pub mod typescript;

use tree_sitter::{Node, Tree};

use crate::model::{ByteRange, FileModel};
use crate::parser::SupportedLanguage;

/// Extracts the semantic model of one file from its syntax tree.
pub trait LanguageFrontend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Walk `tree` (parsed from `source`) and collect definitions, imports
    /// and reference sites. Never fails: unrecognized or erroneous syntax is
    /// skipped.
    fn extract(&self, tree: &Tree, source: &str) -> FileModel;
}

static PYTHON: python::PythonFrontend = python::PythonFrontend;
static TYPESCRIPT: typescript::TypeScriptFrontend = typescript::TypeScriptFrontend;

/// Front-end responsible for `language`.
pub fn frontend_for(language: SupportedLanguage) -> &'static dyn LanguageFrontend {
    match language {
        SupportedLanguage::Python => &PYTHON,
        SupportedLanguage::JavaScript | SupportedLanguage::TypeScript | SupportedLanguage::Tsx => {
            &TYPESCRIPT
        }
    }
}

/// Extract `source` with the front-end for `language`.
pub fn extract(language: SupportedLanguage, tree: &Tree, source: &str) -> FileModel {
    let mut model = frontend_for(language).extract(tree, source);
    model.has_errors = tree.root_node().has_error();
    model
}

// ============================================================================
// Shared Helpers
// ============================================================================

pub(crate) fn range_of(node: &Node) -> ByteRange {
    ByteRange::new(node.start_byte(), node.end_byte())
}

pub(crate) fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Named children of `node`, collected so callers can recurse freely.
pub(crate) fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub(crate) fn children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// True when `node` has an anonymous child token spelled `token`.
pub(crate) fn has_token(node: &Node, token: &str) -> bool {
    children(node)
        .iter()
        .any(|child| !child.is_named() && child.kind() == token)
}

/// True when `node` is the child stored under `field` of its parent.
pub(crate) fn is_field_of(node: &Node, parent: &Node, field: &str) -> bool {
    let mut cursor = parent.walk();
    let found = parent
        .children_by_field_name(field, &mut cursor)
        .any(|child| child == *node);
    found
}

/// Comments directly above `node`, with no blank line in between.
pub(crate) fn leading_comments(node: &Node, source: &str) -> Option<ByteRange> {
    let mut first: Option<Node> = None;
    let mut next_start = node.start_byte();
    let mut cursor = node.prev_sibling();
    while let Some(prev) = cursor {
        if prev.kind() != "comment" {
            break;
        }
        let gap = &source[prev.end_byte()..next_start];
        if !gap.trim().is_empty() || gap.matches('\n').count() > 1 {
            break;
        }
        first = Some(prev);
        next_start = prev.start_byte();
        cursor = prev.prev_sibling();
    }
    let first = first?;
    let last_end = node
        .prev_sibling()
        .map(|n| n.end_byte())
        .unwrap_or(first.end_byte());
    Some(ByteRange::new(first.start_byte(), last_end))
}

/// Strip the quotes from a string literal's text.
pub(crate) fn unquote(literal: &str) -> &str {
    let trimmed = literal.trim();
    let stripped = trimmed
        .strip_prefix(['"', '\'', '`'])
        .and_then(|s| s.strip_suffix(['"', '\'', '`']));
    stripped.unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'./util'"), "./util");
        assert_eq!(unquote("\"@app/core\""), "@app/core");
        assert_eq!(unquote("bare"), "bare");
    }

    #[test]
    fn test_frontend_dispatch() {
        assert_eq!(frontend_for(SupportedLanguage::Python).name(), "python");
        assert_eq!(frontend_for(SupportedLanguage::Tsx).name(), "typescript");
        assert_eq!(frontend_for(SupportedLanguage::JavaScript).name(), "typescript");
    }
}
