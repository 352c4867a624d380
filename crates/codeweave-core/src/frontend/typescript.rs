//! TypeScript / JavaScript front-end.
//!
//! One walker serves `.ts`, `.tsx` and the JavaScript extensions; the two
//! grammars differ mostly in node names for class names and fields, which the
//! walker accepts in both spellings.

use tree_sitter::{Node, Tree};

use super::{
    has_token, is_field_of, leading_comments, named_children, node_text, range_of,
    unquote, LanguageFrontend,
};
use crate::model::{
    ByteRange, ExportDef, FileModel, ImportInfo, ReferenceContext, ReferenceSite, SymbolDef,
    SymbolKind,
};

/// Front-end for TypeScript, TSX and JavaScript files.
pub struct TypeScriptFrontend;

impl LanguageFrontend for TypeScriptFrontend {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extract(&self, tree: &Tree, source: &str) -> FileModel {
        let mut extractor = Extractor {
            src: source,
            model: FileModel::default(),
        };
        let root = tree.root_node();
        for stmt in named_children(&root) {
            extractor.statement(stmt);
        }
        extractor.collect_references(root);
        extractor.model
    }
}

/// How a declaration was exported.
#[derive(Debug, Clone, Copy, Default)]
struct Export {
    exported: bool,
    default: bool,
}

struct Extractor<'s> {
    src: &'s str,
    model: FileModel,
}

impl<'s> Extractor<'s> {
    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.src)
    }

    fn push(&mut self, mut def: SymbolDef, parent: Option<usize>) -> usize {
        def.parent = parent;
        self.model.symbols.push(def);
        self.model.symbols.len() - 1
    }

    fn statement(&mut self, stmt: Node) {
        match stmt.kind() {
            "import_statement" => self.import(stmt),
            "export_statement" => self.export(stmt),
            _ => self.declaration(stmt, stmt, Export::default(), None),
        }
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn declaration(&mut self, decl: Node, outer: Node, export: Export, parent: Option<usize>) {
        match decl.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                self.function(decl, decl, outer, export, parent, SymbolKind::Function);
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                self.class(decl, outer, export, parent)
            }
            "interface_declaration" => {
                self.simple(decl, outer, export, parent, SymbolKind::Interface)
            }
            "type_alias_declaration" => {
                self.simple(decl, outer, export, parent, SymbolKind::TypeAlias)
            }
            "enum_declaration" => self.simple(decl, outer, export, parent, SymbolKind::Enum),
            "lexical_declaration" | "variable_declaration" => {
                self.variables(decl, outer, export, parent)
            }
            "ambient_declaration" => {
                for inner in named_children(&decl) {
                    self.declaration(inner, outer, export, parent);
                }
            }
            _ => {}
        }
    }

    fn new_symbol(
        &self,
        name_node: &Node,
        kind: SymbolKind,
        range: ByteRange,
        outer: &Node,
        export: Export,
    ) -> SymbolDef {
        let mut symbol = SymbolDef::new(self.text(name_node), kind, range);
        symbol.info.name_range = Some(range_of(name_node));
        symbol.info.is_exported = export.exported;
        symbol.info.is_default_export = export.default;

        let mut extended = range_of(outer).union(&range);
        if let Some(comments) = leading_comments(outer, self.src) {
            symbol.info.comment_range = Some(comments);
            extended = extended.union(&comments);
            if let Some(last) = outer.prev_sibling() {
                if self.text(&last).starts_with("/**") {
                    symbol.info.docstring_range = Some(range_of(&last));
                }
            }
        }
        symbol.info.extended_range = extended;
        symbol
    }

    /// Functions, methods and arrow functions bound to a name.
    fn function(
        &mut self,
        func: Node,
        name_source: Node,
        outer: Node,
        export: Export,
        parent: Option<usize>,
        kind: SymbolKind,
    ) -> Option<usize> {
        let name_node = name_source
            .child_by_field_name("name")
            .or_else(|| name_source.child_by_field_name("property"))?;
        // A declarator spans `name = value`; callers widen it to the
        // statement when it is the only one.
        let range = if name_source.kind() == "variable_declarator" {
            range_of(&name_source)
        } else {
            range_of(&func)
        };
        let mut symbol = self.new_symbol(&name_node, kind, range, &outer, export);
        symbol.info.is_async = has_token(&func, "async");
        symbol.info.decorators = self.decorator_names(&func);

        let body = func.child_by_field_name("body");
        if let Some(body) = body {
            symbol.info.body_range = Some(range_of(&body));
            symbol.locals = self.collect_locals(&body);
        }

        let index = self.push(symbol, parent);
        self.decorator_symbols(&func, index);

        let params = self.parameters(&func);
        for (name, range) in params {
            self.model.symbols[index].locals.push(name.clone());
            self.push(SymbolDef::new(name, SymbolKind::Parameter, range), Some(index));
        }
        let locals = &mut self.model.symbols[index].locals;
        locals.sort();
        locals.dedup();

        if let Some(body) = body {
            if body.kind() == "statement_block" {
                for stmt in named_children(&body) {
                    if matches!(stmt.kind(), "function_declaration" | "class_declaration") {
                        self.declaration(stmt, stmt, Export::default(), Some(index));
                    }
                }
            }
        }
        Some(index)
    }

    fn class(&mut self, decl: Node, outer: Node, export: Export, parent: Option<usize>) {
        let Some(name_node) = decl.child_by_field_name("name") else {
            return;
        };
        let mut symbol =
            self.new_symbol(&name_node, SymbolKind::Class, range_of(&decl), &outer, export);
        let mut decorators = self.decorator_names(&decl);
        if outer != decl {
            decorators.extend(self.decorator_names(&outer));
        }
        symbol.info.decorators = decorators;

        for child in named_children(&decl) {
            if child.kind() == "class_heritage" {
                symbol.info.superclasses = self.heritage_names(&child);
            }
        }

        let body = decl.child_by_field_name("body");
        if let Some(body) = body {
            symbol.info.body_range = Some(range_of(&body));
        }
        let index = self.push(symbol, parent);
        self.decorator_symbols(&decl, index);
        if outer != decl {
            self.decorator_symbols(&outer, index);
        }

        let Some(body) = body else {
            return;
        };
        for member in named_children(&body) {
            match member.kind() {
                "method_definition" | "method_signature" | "abstract_method_signature" => {
                    self.function(
                        member,
                        member,
                        member,
                        Export::default(),
                        Some(index),
                        SymbolKind::Method,
                    );
                }
                "public_field_definition" | "field_definition" => {
                    let Some(name_node) = member
                        .child_by_field_name("name")
                        .or_else(|| member.child_by_field_name("property"))
                    else {
                        continue;
                    };
                    let symbol = self.new_symbol(
                        &name_node,
                        SymbolKind::Attribute,
                        range_of(&member),
                        &member,
                        Export::default(),
                    );
                    self.push(symbol, Some(index));
                }
                _ => {}
            }
        }
    }

    /// Interfaces, type aliases and enums.
    fn simple(
        &mut self,
        decl: Node,
        outer: Node,
        export: Export,
        parent: Option<usize>,
        kind: SymbolKind,
    ) {
        let Some(name_node) = decl.child_by_field_name("name") else {
            return;
        };
        let mut symbol = self.new_symbol(&name_node, kind, range_of(&decl), &outer, export);
        if let Some(body) = decl.child_by_field_name("body") {
            symbol.info.body_range = Some(range_of(&body));
        }
        for child in named_children(&decl) {
            if child.kind() == "extends_type_clause" {
                symbol.info.superclasses = named_children(&child)
                    .iter()
                    .filter_map(|t| self.type_name(t))
                    .collect();
            }
        }
        self.push(symbol, parent);
    }

    /// `const a = 1, f = () => {}`
    fn variables(&mut self, decl: Node, outer: Node, export: Export, parent: Option<usize>) {
        let declarators: Vec<Node> = named_children(&decl)
            .into_iter()
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        let single = declarators.len() == 1;

        for declarator in declarators {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            // A lone declarator owns the whole statement so edits and
            // removals take the keyword and semicolon with them.
            let symbol_outer = if single { outer } else { declarator };
            let value = declarator.child_by_field_name("value");
            match value {
                Some(func)
                    if matches!(
                        func.kind(),
                        "arrow_function" | "function_expression" | "function" | "generator_function"
                    ) =>
                {
                    if let Some(index) = self.function(
                        func,
                        declarator,
                        symbol_outer,
                        export,
                        parent,
                        SymbolKind::Function,
                    ) {
                        if single {
                            self.model.symbols[index].range = range_of(&decl);
                        }
                    }
                }
                _ => {
                    let range = if single { range_of(&decl) } else { range_of(&declarator) };
                    let symbol = self.new_symbol(
                        &name_node,
                        SymbolKind::GlobalVar,
                        range,
                        &symbol_outer,
                        export,
                    );
                    self.push(symbol, parent);
                }
            }
        }
    }

    fn parameters(&self, func: &Node) -> Vec<(String, ByteRange)> {
        if let Some(single) = func.child_by_field_name("parameter") {
            return vec![(self.text(&single).to_string(), range_of(&single))];
        }
        let Some(params) = func.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for param in named_children(&params) {
            let pattern = match param.kind() {
                "required_parameter" | "optional_parameter" => param.child_by_field_name("pattern"),
                "identifier" => Some(param),
                "assignment_pattern" => param.child_by_field_name("left"),
                "rest_pattern" => param.named_child(0),
                _ => None,
            };
            if let Some(pattern) = pattern {
                let mut names = Vec::new();
                self.pattern_names(&pattern, &mut names);
                for name in names {
                    out.push((name, range_of(&param)));
                }
            }
        }
        out
    }

    fn pattern_names(&self, pattern: &Node, out: &mut Vec<String>) {
        match pattern.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                out.push(self.text(pattern).to_string())
            }
            "object_pattern" | "array_pattern" | "rest_pattern" | "pair_pattern"
            | "object_assignment_pattern" | "assignment_pattern" => {
                for child in named_children(pattern) {
                    if pattern.kind() == "pair_pattern" && is_field_of(&child, pattern, "key") {
                        continue;
                    }
                    if matches!(pattern.kind(), "assignment_pattern" | "object_assignment_pattern")
                        && is_field_of(&child, pattern, "right")
                    {
                        continue;
                    }
                    self.pattern_names(&child, out);
                }
            }
            _ => {}
        }
    }

    /// Names declared in a function body, excluding nested functions.
    fn collect_locals(&self, body: &Node) -> Vec<String> {
        let mut locals = Vec::new();
        let mut stack = vec![*body];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "function_declaration" | "class_declaration" | "generator_function_declaration" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        locals.push(self.text(&name).to_string());
                    }
                    continue;
                }
                "arrow_function" | "function_expression" | "function" | "class" => continue,
                "variable_declarator" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        self.pattern_names(&name, &mut locals);
                    }
                }
                "catch_clause" => {
                    if let Some(param) = node.child_by_field_name("parameter") {
                        self.pattern_names(&param, &mut locals);
                    }
                }
                "for_in_statement" => {
                    if let Some(left) = node.child_by_field_name("left") {
                        self.pattern_names(&left, &mut locals);
                    }
                }
                _ => {}
            }
            stack.extend(named_children(&node));
        }
        locals.sort();
        locals.dedup();
        locals
    }

    fn heritage_names(&self, heritage: &Node) -> Vec<String> {
        let mut names = Vec::new();
        for clause in named_children(heritage) {
            match clause.kind() {
                "extends_clause" => {
                    if let Some(value) = clause.child_by_field_name("value") {
                        names.push(self.text(&value).to_string());
                    }
                }
                "implements_clause" => {
                    names.extend(named_children(&clause).iter().filter_map(|t| self.type_name(t)));
                }
                // JavaScript: `class A extends B` has the expression directly.
                "identifier" | "member_expression" => names.push(self.text(&clause).to_string()),
                _ => {}
            }
        }
        names
    }

    fn type_name(&self, node: &Node) -> Option<String> {
        match node.kind() {
            "type_identifier" | "nested_type_identifier" | "identifier" => {
                Some(self.text(node).to_string())
            }
            "generic_type" => node
                .child_by_field_name("name")
                .map(|n| self.text(&n).to_string()),
            _ => None,
        }
    }

    fn decorators_of<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
        named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "decorator")
            .collect()
    }

    fn decorator_names(&self, node: &Node) -> Vec<String> {
        Self::decorators_of(node)
            .iter()
            .map(|d| {
                let text = self.text(d).trim_start_matches('@').trim();
                text.split('(').next().unwrap_or(text).trim().to_string()
            })
            .collect()
    }

    fn decorator_symbols(&mut self, node: &Node, owner: usize) {
        let names = self.decorator_names(node);
        for (decorator, name) in Self::decorators_of(node).iter().zip(names) {
            self.push(
                SymbolDef::new(name, SymbolKind::Decorator, range_of(decorator)),
                Some(owner),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Imports and Exports
    // ------------------------------------------------------------------------

    fn source_of(&self, stmt: &Node) -> Option<(String, ByteRange)> {
        let source = stmt.child_by_field_name("source")?;
        Some((unquote(self.text(&source)).to_string(), range_of(&source)))
    }

    fn import(&mut self, stmt: Node) {
        let Some((module, module_range)) = self.source_of(&stmt) else {
            return;
        };
        let statement_range = range_of(&stmt);
        let type_only = has_token(&stmt, "type");
        let base = ImportInfo {
            module,
            module_range: Some(module_range),
            statement_range,
            is_type_only: type_only,
            ..Default::default()
        };

        let Some(clause) = named_children(&stmt)
            .into_iter()
            .find(|c| c.kind() == "import_clause")
        else {
            tracing::trace!(module = %base.module, "side-effect import skipped");
            return;
        };

        for part in named_children(&clause) {
            match part.kind() {
                "identifier" => self.model.imports.push(ImportInfo {
                    imported_name: Some("default".to_string()),
                    alias: self.text(&part).to_string(),
                    alias_range: Some(range_of(&part)),
                    ..base.clone()
                }),
                "namespace_import" => {
                    let ident = named_children(&part)
                        .into_iter()
                        .find(|c| c.kind() == "identifier");
                    if let Some(ident) = ident {
                        self.model.imports.push(ImportInfo {
                            alias: self.text(&ident).to_string(),
                            alias_range: Some(range_of(&ident)),
                            is_module_import: true,
                            ..base.clone()
                        });
                    }
                }
                "named_imports" => {
                    for spec in named_children(&part) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(import) = self.specifier(&spec, &base) {
                            self.model.imports.push(import);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// `a` or `a as b` inside braces, for both imports and re-exports.
    fn specifier(&self, spec: &Node, base: &ImportInfo) -> Option<ImportInfo> {
        let name = spec.child_by_field_name("name")?;
        let alias = spec.child_by_field_name("alias");
        let imported = unquote(self.text(&name)).to_string();
        Some(ImportInfo {
            alias: alias
                .map(|a| self.text(&a).to_string())
                .unwrap_or_else(|| imported.clone()),
            imported_name: Some(imported),
            name_range: Some(range_of(&name)),
            alias_range: alias.map(|a| range_of(&a)),
            is_type_only: base.is_type_only || has_token(spec, "type"),
            ..base.clone()
        })
    }

    fn export(&mut self, stmt: Node) {
        let default = has_token(&stmt, "default");
        if let Some(decl) = stmt.child_by_field_name("declaration") {
            let export = Export {
                exported: true,
                default,
            };
            self.declaration(decl, stmt, export, None);
            return;
        }

        let clause = named_children(&stmt)
            .into_iter()
            .find(|c| c.kind() == "export_clause");

        if let Some((module, module_range)) = self.source_of(&stmt) {
            let base = ImportInfo {
                module,
                module_range: Some(module_range),
                statement_range: range_of(&stmt),
                is_reexport: true,
                is_type_only: has_token(&stmt, "type"),
                ..Default::default()
            };
            if let Some(clause) = clause {
                for spec in named_children(&clause) {
                    if spec.kind() != "export_specifier" {
                        continue;
                    }
                    if let Some(import) = self.specifier(&spec, &base) {
                        self.model.imports.push(import);
                    }
                }
            } else if let Some(ns) = named_children(&stmt)
                .into_iter()
                .find(|c| c.kind() == "namespace_export")
            {
                // `export * as ns from "x"`
                if let Some(ident) = named_children(&ns).into_iter().next() {
                    self.model.imports.push(ImportInfo {
                        alias: unquote(self.text(&ident)).to_string(),
                        alias_range: Some(range_of(&ident)),
                        is_module_import: true,
                        ..base
                    });
                }
            } else {
                self.model.imports.push(ImportInfo {
                    alias: "*".to_string(),
                    is_wildcard: true,
                    ..base
                });
            }
            return;
        }

        if let Some(clause) = clause {
            for spec in named_children(&clause) {
                let Some(name) = spec.child_by_field_name("name") else {
                    continue;
                };
                let local = self.text(&name).to_string();
                let exported = spec
                    .child_by_field_name("alias")
                    .map(|a| unquote(self.text(&a)).to_string())
                    .unwrap_or_else(|| local.clone());
                self.model.exports.push(ExportDef {
                    exported,
                    local,
                    local_range: range_of(&name),
                });
            }
            return;
        }

        if default {
            if let Some(value) = stmt.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    self.model.exports.push(ExportDef {
                        exported: "default".to_string(),
                        local: self.text(&value).to_string(),
                        local_range: range_of(&value),
                    });
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------------

    fn collect_references(&mut self, root: Node) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" | "comment" | "regex" | "string" => continue,
                "export_statement" => {
                    if node.child_by_field_name("source").is_some() {
                        continue;
                    }
                    stack.extend(
                        named_children(&node)
                            .into_iter()
                            .filter(|c| c.kind() != "export_clause"),
                    );
                    continue;
                }
                "template_string" => {
                    stack.extend(
                        named_children(&node)
                            .into_iter()
                            .filter(|c| c.kind() == "template_substitution"),
                    );
                    continue;
                }
                "identifier" | "type_identifier" | "shorthand_property_identifier" => {
                    if is_reference(&node) {
                        self.model.references.push(ReferenceSite::new(
                            self.text(&node),
                            range_of(&node),
                            reference_context(&node),
                        ));
                    }
                    continue;
                }
                "member_expression" | "nested_type_identifier" => {
                    if let Some((base, chain)) = flatten_member(node) {
                        if is_reference(&base) {
                            let mut site = ReferenceSite::new(
                                self.text(&base),
                                range_of(&base),
                                reference_context(&node),
                            );
                            site.chain = chain
                                .iter()
                                .map(|p| (self.text(p).to_string(), range_of(p)))
                                .collect();
                            self.model.references.push(site);
                        }
                        continue;
                    }
                }
                _ => {}
            }
            stack.extend(named_children(&node));
        }
        self.model.references.sort_by_key(|r| r.range.start);
    }
}

/// `a.b.c` → (`a`, [`b`, `c`]); `ns.Type` → (`ns`, [`Type`]).
fn flatten_member(node: Node) -> Option<(Node, Vec<Node>)> {
    let mut chain = Vec::new();
    let mut current = node;
    loop {
        match current.kind() {
            "member_expression" => {
                chain.push(current.child_by_field_name("property")?);
                current = current.child_by_field_name("object")?;
            }
            "nested_type_identifier" => {
                chain.push(current.child_by_field_name("name")?);
                current = current.child_by_field_name("module")?;
            }
            "identifier" => break,
            _ => return None,
        }
    }
    chain.reverse();
    Some((current, chain))
}

/// Whether an identifier reads a name rather than declaring one.
fn is_reference(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "function_declaration" | "generator_function_declaration" | "function_expression"
        | "function" | "class_declaration" | "abstract_class_declaration" | "class"
        | "interface_declaration" | "type_alias_declaration" | "enum_declaration"
        | "function_signature" | "type_parameter" | "variable_declarator" => {
            !is_field_of(node, &parent, "name")
        }
        "required_parameter" | "optional_parameter" => !is_field_of(node, &parent, "pattern"),
        "arrow_function" => !is_field_of(node, &parent, "parameter"),
        "catch_clause" => !is_field_of(node, &parent, "parameter"),
        "assignment_pattern" | "object_assignment_pattern" => {
            !is_field_of(node, &parent, "left")
        }
        "for_in_statement" => !is_field_of(node, &parent, "left"),
        "formal_parameters" | "rest_pattern" | "array_pattern" | "object_pattern"
        | "labeled_statement" | "break_statement" | "continue_statement"
        | "jsx_closing_element" | "import_specifier" | "export_specifier"
        | "namespace_import" | "import_clause" => false,
        "pair_pattern" => !is_field_of(node, &parent, "key"),
        _ => true,
    }
}

fn reference_context(node: &Node) -> ReferenceContext {
    if node.kind() == "type_identifier" || node.kind() == "nested_type_identifier" {
        return ReferenceContext::Type;
    }
    let mut current = *node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "call_expression" | "new_expression"
                if is_field_of(&current, &parent, "function")
                    || is_field_of(&current, &parent, "constructor") =>
            {
                return ReferenceContext::Call
            }
            "class_heritage" | "extends_clause" | "implements_clause" => {
                return ReferenceContext::Superclass
            }
            "decorator" => return ReferenceContext::Decorator,
            "type_annotation" | "type_arguments" => return ReferenceContext::Type,
            "member_expression" => current = parent,
            _ => return ReferenceContext::Value,
        }
    }
    ReferenceContext::Value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{CodeParser, SupportedLanguage};
    use pretty_assertions::assert_eq;

    fn extract_with(language: SupportedLanguage, source: &str) -> FileModel {
        let mut parser = CodeParser::new(language).unwrap();
        let tree = parser.parse(source).unwrap();
        TypeScriptFrontend.extract(&tree, source)
    }

    fn extract(source: &str) -> FileModel {
        extract_with(SupportedLanguage::TypeScript, source)
    }

    fn symbol<'m>(model: &'m FileModel, name: &str) -> &'m SymbolDef {
        model.symbols.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_declarations() {
        let source = r#"
/** Adds. */
export function add(a: number, b = 2): number { return a + b; }
export default class Widget extends Base implements Drawable {
  size = 1;
  render(): void {}
}
interface Drawable extends Shape {}
type Id = string;
enum Color { Red }
export const handler = async (event) => event;
const LIMIT = 3;
"#;
        let model = extract(source);

        let add = symbol(&model, "add");
        assert_eq!(add.kind(), SymbolKind::Function);
        assert!(add.info.is_exported);
        assert_eq!(add.locals, vec!["a", "b"]);
        assert_eq!(add.info.docstring_range.unwrap().slice(source), "/** Adds. */");
        assert!(add.info.extended_range.slice(source).starts_with("/** Adds. */\nexport"));

        let widget = symbol(&model, "Widget");
        assert_eq!(widget.kind(), SymbolKind::Class);
        assert!(widget.info.is_default_export);
        assert_eq!(widget.info.superclasses, vec!["Base", "Drawable"]);
        assert_eq!(symbol(&model, "render").kind(), SymbolKind::Method);
        assert_eq!(symbol(&model, "size").kind(), SymbolKind::Attribute);

        assert_eq!(symbol(&model, "Drawable").kind(), SymbolKind::Interface);
        assert_eq!(symbol(&model, "Drawable").info.superclasses, vec!["Shape"]);
        assert_eq!(symbol(&model, "Id").kind(), SymbolKind::TypeAlias);
        assert_eq!(symbol(&model, "Color").kind(), SymbolKind::Enum);

        let handler = symbol(&model, "handler");
        assert_eq!(handler.kind(), SymbolKind::Function);
        assert!(handler.info.is_async);
        assert_eq!(handler.range.slice(source), "const handler = async (event) => event;");

        let limit = symbol(&model, "LIMIT");
        assert_eq!(limit.kind(), SymbolKind::GlobalVar);
        assert!(!limit.info.is_exported);
    }

    #[test]
    fn test_imports_and_reexports() {
        let source = r#"
import Default, { a, b as c } from "./mod";
import * as ns from "../ns";
import type { T } from "@app/types";
import "./side-effect";
export { x as y } from "./x";
export * from "./all";
export { local as renamed };
export default local;
"#;
        let model = extract(source);
        let summary: Vec<(&str, Option<&str>, &str, bool, bool, bool)> = model
            .imports
            .iter()
            .map(|i| {
                (
                    i.module.as_str(),
                    i.imported_name.as_deref(),
                    i.alias.as_str(),
                    i.is_module_import,
                    i.is_wildcard,
                    i.is_reexport,
                )
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                ("./mod", Some("default"), "Default", false, false, false),
                ("./mod", Some("a"), "a", false, false, false),
                ("./mod", Some("b"), "c", false, false, false),
                ("../ns", None, "ns", true, false, false),
                ("@app/types", Some("T"), "T", false, false, false),
                ("./x", Some("x"), "y", false, false, true),
                ("./all", None, "*", false, true, true),
            ]
        );
        assert!(model.imports[4].is_type_only);

        let exports: Vec<(&str, &str)> = model
            .exports
            .iter()
            .map(|e| (e.exported.as_str(), e.local.as_str()))
            .collect();
        assert_eq!(exports, vec![("renamed", "local"), ("default", "local")]);
    }

    #[test]
    fn test_references_skip_declarations_and_parameters() {
        let source = "function f(a) {\n  const b = helper(a);\n  return api.client.get(b);\n}\n";
        let model = extract(source);
        let refs: Vec<(&str, Vec<&str>)> = model
            .references
            .iter()
            .map(|r| (r.name.as_str(), r.chain.iter().map(|(n, _)| n.as_str()).collect()))
            .collect();

        assert_eq!(
            refs,
            vec![
                ("helper", vec![]),
                ("a", vec![]),
                ("api", vec!["client", "get"]),
                ("b", vec![]),
            ]
        );
        assert_eq!(model.references[0].context, ReferenceContext::Call);
        assert_eq!(symbol(&model, "f").locals, vec!["a", "b"]);
    }

    #[test]
    fn test_type_references() {
        let model = extract("let x: Config = make();\n");
        let config = model.references.iter().find(|r| r.name == "Config").unwrap();
        assert_eq!(config.context, ReferenceContext::Type);
    }

    #[test]
    fn test_javascript_class_heritage() {
        let model = extract_with(
            SupportedLanguage::JavaScript,
            "class Dog extends Animal {\n  bark() {}\n}\n",
        );
        assert_eq!(symbol(&model, "Dog").info.superclasses, vec!["Animal"]);
        assert_eq!(symbol(&model, "bark").kind(), SymbolKind::Method);
    }

    #[test]
    fn test_tsx_component_reference() {
        let model = extract_with(
            SupportedLanguage::Tsx,
            "import { Button } from './button';\nexport const App = () => <Button />;\n",
        );
        assert!(model.references.iter().any(|r| r.name == "Button"));
        assert_eq!(symbol(&model, "App").kind(), SymbolKind::Function);
    }
}
