//! Python front-end.
//!
//! Extracts classes, functions, methods, module-level variables, class
//! attributes, parameters and decorators; `import` / `from ... import`
//! statements including relative and wildcard forms; and every identifier
//! reference with its attribute chain.

use tree_sitter::{Node, Tree};

use super::{
    children, has_token, is_field_of, leading_comments, named_children, node_text, range_of,
    LanguageFrontend,
};
use crate::model::{
    ByteRange, FileModel, ImportInfo, ReferenceContext, ReferenceSite, SymbolDef, SymbolKind,
};

/// Front-end for `.py` / `.pyi` files.
pub struct PythonFrontend;

impl LanguageFrontend for PythonFrontend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract(&self, tree: &Tree, source: &str) -> FileModel {
        let mut extractor = Extractor {
            src: source,
            model: FileModel::default(),
        };
        let root = tree.root_node();
        extractor.visit_block(root, None, Scope::Module);
        extractor.collect_references(root);
        extractor.model
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Class,
    Function,
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

    // ------------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------------

    fn visit_block(&mut self, block: Node, parent: Option<usize>, scope: Scope) {
        for stmt in named_children(&block) {
            match stmt.kind() {
                "function_definition" => self.function(stmt, stmt, parent, scope, Vec::new()),
                "class_definition" => self.class(stmt, stmt, parent, Vec::new()),
                "decorated_definition" => {
                    let decorators: Vec<Node> = named_children(&stmt)
                        .into_iter()
                        .filter(|c| c.kind() == "decorator")
                        .collect();
                    match stmt.child_by_field_name("definition") {
                        Some(def) if def.kind() == "function_definition" => {
                            self.function(def, stmt, parent, scope, decorators)
                        }
                        Some(def) if def.kind() == "class_definition" => {
                            self.class(def, stmt, parent, decorators)
                        }
                        _ => {}
                    }
                }
                "expression_statement" if scope != Scope::Function => {
                    self.assignment(stmt, parent, scope)
                }
                "import_statement" => self.import(stmt),
                "import_from_statement" => self.import_from(stmt),
                "if_statement" | "try_statement" | "with_statement" if scope == Scope::Module => {
                    // `if TYPE_CHECKING:` and `try: import x` bodies
                    for block in nested_blocks(&stmt) {
                        self.visit_block(block, parent, scope);
                    }
                }
                _ => {}
            }
        }
    }

    fn function(
        &mut self,
        def: Node,
        outer: Node,
        parent: Option<usize>,
        scope: Scope,
        decorators: Vec<Node>,
    ) {
        let Some(name_node) = def.child_by_field_name("name") else {
            return;
        };
        let kind = if scope == Scope::Class {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };

        let mut symbol = SymbolDef::new(self.text(&name_node), kind, range_of(&def));
        symbol.info.name_range = Some(range_of(&name_node));
        symbol.info.is_async = has_token(&def, "async");
        symbol.info.decorators = decorators.iter().map(|d| self.decorator_name(d)).collect();
        self.attach_comments(&mut symbol, &outer);

        let body = def.child_by_field_name("body");
        if let Some(body) = body {
            symbol.info.body_range = Some(range_of(&body));
            symbol.info.docstring_range = docstring(&body);
            symbol.locals = self.collect_locals(&body);
        }

        let index = self.push(symbol, parent);
        self.decorators(&decorators, index);

        if let Some(params) = def.child_by_field_name("parameters") {
            for (name, range) in self.parameters(&params) {
                self.model.symbols[index].locals.push(name.clone());
                self.push(SymbolDef::new(name, SymbolKind::Parameter, range), Some(index));
            }
            let locals = &mut self.model.symbols[index].locals;
            locals.sort();
            locals.dedup();
        }

        if let Some(body) = body {
            self.visit_block(body, Some(index), Scope::Function);
        }
    }

    fn class(&mut self, def: Node, outer: Node, parent: Option<usize>, decorators: Vec<Node>) {
        let Some(name_node) = def.child_by_field_name("name") else {
            return;
        };

        let mut symbol = SymbolDef::new(self.text(&name_node), SymbolKind::Class, range_of(&def));
        symbol.info.name_range = Some(range_of(&name_node));
        symbol.info.decorators = decorators.iter().map(|d| self.decorator_name(d)).collect();
        self.attach_comments(&mut symbol, &outer);

        if let Some(bases) = def.child_by_field_name("superclasses") {
            symbol.info.superclasses = named_children(&bases)
                .iter()
                .filter(|b| matches!(b.kind(), "identifier" | "attribute"))
                .map(|b| self.text(b).to_string())
                .collect();
        }

        let body = def.child_by_field_name("body");
        if let Some(body) = body {
            symbol.info.body_range = Some(range_of(&body));
            symbol.info.docstring_range = docstring(&body);
        }

        let index = self.push(symbol, parent);
        self.decorators(&decorators, index);
        if let Some(body) = body {
            self.visit_block(body, Some(index), Scope::Class);
        }
    }

    /// Module-level variables and class attributes.
    fn assignment(&mut self, stmt: Node, parent: Option<usize>, scope: Scope) {
        let Some(assign) = stmt.named_child(0) else {
            return;
        };
        if assign.kind() != "assignment" {
            return;
        }
        let Some(left) = assign.child_by_field_name("left") else {
            return;
        };
        let kind = if scope == Scope::Class {
            SymbolKind::Attribute
        } else {
            SymbolKind::GlobalVar
        };

        let targets: Vec<Node> = match left.kind() {
            "identifier" => vec![left],
            "pattern_list" | "tuple_pattern" => named_children(&left)
                .into_iter()
                .filter(|n| n.kind() == "identifier")
                .collect(),
            _ => Vec::new(),
        };
        for target in targets {
            let mut symbol = SymbolDef::new(self.text(&target), kind, range_of(&stmt));
            symbol.info.name_range = Some(range_of(&target));
            self.attach_comments(&mut symbol, &stmt);
            self.push(symbol, parent);
        }
    }

    fn decorators(&mut self, decorators: &[Node], owner: usize) {
        for decorator in decorators {
            let name = self.decorator_name(decorator);
            self.push(
                SymbolDef::new(name, SymbolKind::Decorator, range_of(decorator)),
                Some(owner),
            );
        }
    }

    /// `@app.route("/x")` → `app.route`
    fn decorator_name(&self, decorator: &Node) -> String {
        let text = self.text(decorator).trim_start_matches('@').trim();
        text.split('(').next().unwrap_or(text).trim().to_string()
    }

    fn attach_comments(&self, symbol: &mut SymbolDef, outer: &Node) {
        let mut extended = range_of(outer);
        if let Some(comments) = leading_comments(outer, self.src) {
            symbol.info.comment_range = Some(comments);
            extended = extended.union(&comments);
        }
        symbol.info.extended_range = extended;
    }

    fn parameters(&self, params: &Node) -> Vec<(String, ByteRange)> {
        let mut out = Vec::new();
        for param in named_children(params) {
            let name_node = match param.kind() {
                "identifier" => Some(param),
                "default_parameter" | "typed_default_parameter" => {
                    param.child_by_field_name("name")
                }
                "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                    named_children(&param).into_iter().find(|c| c.kind() == "identifier")
                }
                _ => None,
            };
            if let Some(name_node) = name_node {
                out.push((self.text(&name_node).to_string(), range_of(&param)));
            }
        }
        out
    }

    /// Names bound in a function body, excluding nested scopes.
    fn collect_locals(&self, body: &Node) -> Vec<String> {
        let mut locals = Vec::new();
        let mut globals = Vec::new();
        let mut stack = vec![*body];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "function_definition" | "class_definition" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        locals.push(self.text(&name).to_string());
                    }
                    continue;
                }
                "lambda" => continue,
                "assignment" | "augmented_assignment" => {
                    if let Some(left) = node.child_by_field_name("left") {
                        self.binding_names(&left, &mut locals);
                    }
                }
                "for_statement" | "for_in_clause" => {
                    if let Some(left) = node.child_by_field_name("left") {
                        self.binding_names(&left, &mut locals);
                    }
                }
                "named_expression" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        locals.push(self.text(&name).to_string());
                    }
                }
                "as_pattern_target" => self.binding_names(&node, &mut locals),
                "global_statement" | "nonlocal_statement" => {
                    for name in named_children(&node) {
                        globals.push(self.text(&name).to_string());
                    }
                }
                "import_statement" | "import_from_statement" => continue,
                _ => {}
            }
            stack.extend(named_children(&node));
        }
        locals.retain(|name| !globals.contains(name));
        locals.sort();
        locals.dedup();
        locals
    }

    fn binding_names(&self, target: &Node, out: &mut Vec<String>) {
        match target.kind() {
            "identifier" => out.push(self.text(target).to_string()),
            "pattern_list" | "tuple_pattern" | "list_pattern" | "as_pattern_target"
            | "list_splat_pattern" => {
                for child in named_children(target) {
                    self.binding_names(&child, out);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------------

    /// `import a.b`, `import a.b as c`
    fn import(&mut self, stmt: Node) {
        let mut cursor = stmt.walk();
        let names: Vec<Node> = stmt.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let import = match name.kind() {
                "dotted_name" => ImportInfo {
                    module: self.text(&name).to_string(),
                    alias: self.text(&name).to_string(),
                    name_range: Some(range_of(&name)),
                    module_range: Some(range_of(&name)),
                    statement_range: range_of(&stmt),
                    is_module_import: true,
                    ..Default::default()
                },
                "aliased_import" => {
                    let (Some(module), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    ImportInfo {
                        module: self.text(&module).to_string(),
                        alias: self.text(&alias).to_string(),
                        name_range: Some(range_of(&module)),
                        alias_range: Some(range_of(&alias)),
                        module_range: Some(range_of(&module)),
                        statement_range: range_of(&stmt),
                        is_module_import: true,
                        ..Default::default()
                    }
                }
                _ => continue,
            };
            self.model.imports.push(import);
        }
    }

    /// `from m import a`, `from .m import a as b`, `from m import *`
    fn import_from(&mut self, stmt: Node) {
        let Some(module_node) = stmt.child_by_field_name("module_name") else {
            return;
        };
        let module = self.text(&module_node).to_string();
        let statement_range = range_of(&stmt);
        let module_range = Some(range_of(&module_node));

        if children(&stmt).iter().any(|c| c.kind() == "wildcard_import") {
            self.model.imports.push(ImportInfo {
                module,
                alias: "*".to_string(),
                module_range,
                statement_range,
                is_wildcard: true,
                ..Default::default()
            });
            return;
        }

        let mut cursor = stmt.walk();
        let names: Vec<Node> = stmt.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let (imported, alias) = match name.kind() {
                "dotted_name" => (name, None),
                "aliased_import" => {
                    let Some(imported) = name.child_by_field_name("name") else {
                        continue;
                    };
                    (imported, name.child_by_field_name("alias"))
                }
                _ => continue,
            };
            let imported_name = self.text(&imported).to_string();
            self.model.imports.push(ImportInfo {
                module: module.clone(),
                alias: alias
                    .map(|a| self.text(&a).to_string())
                    .unwrap_or_else(|| imported_name.clone()),
                imported_name: Some(imported_name),
                name_range: Some(range_of(&imported)),
                alias_range: alias.map(|a| range_of(&a)),
                module_range,
                statement_range,
                ..Default::default()
            });
        }
    }

    // ------------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------------

    fn collect_references(&mut self, root: Node) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" | "import_from_statement" | "future_import_statement"
                | "comment" => continue,
                "string" => {
                    // Only f-string interpolations hold code.
                    stack.extend(
                        named_children(&node)
                            .into_iter()
                            .filter(|c| c.kind() == "interpolation"),
                    );
                    continue;
                }
                "identifier" => {
                    if is_reference(&node) {
                        let site = ReferenceSite::new(
                            self.text(&node),
                            range_of(&node),
                            reference_context(&node),
                        );
                        self.model.references.push(site);
                    }
                    continue;
                }
                "attribute" => {
                    if let Some((base, chain)) = flatten_attribute(node) {
                        if is_reference(&base) {
                            let mut site = ReferenceSite::new(
                                self.text(&base),
                                range_of(&base),
                                reference_context(&node),
                            );
                            site.chain = chain
                                .iter()
                                .map(|attr| (self.text(attr).to_string(), range_of(attr)))
                                .collect();
                            self.model.references.push(site);
                        }
                        continue;
                    }
                }
                _ => {}
            }
            let mut kids = named_children(&node);
            kids.reverse();
            stack.extend(kids);
        }
        self.model.references.sort_by_key(|r| r.range.start);
    }
}

/// Blocks nested in compound statements (`if`/`elif`/`else`, `try`/`except`).
fn nested_blocks<'t>(stmt: &Node<'t>) -> Vec<Node<'t>> {
    let mut blocks = Vec::new();
    for child in named_children(stmt) {
        if child.kind() == "block" {
            blocks.push(child);
        } else if child.kind().ends_with("_clause") {
            blocks.extend(
                named_children(&child)
                    .into_iter()
                    .filter(|c| c.kind() == "block"),
            );
        }
    }
    blocks
}

fn docstring(body: &Node) -> Option<ByteRange> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0)?;
    (literal.kind() == "string").then(|| range_of(&literal))
}

/// `a.b.c` → (`a`, [`b`, `c`]) when the chain bottoms out in an identifier.
fn flatten_attribute(node: Node) -> Option<(Node, Vec<Node>)> {
    let mut chain = Vec::new();
    let mut current = node;
    loop {
        match current.kind() {
            "attribute" => {
                chain.push(current.child_by_field_name("attribute")?);
                current = current.child_by_field_name("object")?;
            }
            "identifier" => break,
            _ => return None,
        }
    }
    chain.reverse();
    Some((current, chain))
}

/// Whether an identifier reads a name rather than binding one.
fn is_reference(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "function_definition" | "class_definition" => !is_field_of(node, &parent, "name"),
        "parameters" | "lambda_parameters" | "typed_parameter" | "global_statement"
        | "nonlocal_statement" | "as_pattern_target" | "pattern_list" | "tuple_pattern"
        | "list_pattern" | "aliased_import" | "dotted_name" => false,
        "default_parameter" | "typed_default_parameter" | "keyword_argument"
        | "named_expression" => !is_field_of(node, &parent, "name"),
        "list_splat_pattern" | "dictionary_splat_pattern" => parent
            .parent()
            .is_none_or(|gp| !matches!(gp.kind(), "parameters" | "lambda_parameters")),
        "attribute" => !is_field_of(node, &parent, "attribute"),
        "assignment" | "augmented_assignment" => !is_field_of(node, &parent, "left"),
        "for_statement" | "for_in_clause" => !is_field_of(node, &parent, "left"),
        _ => true,
    }
}

fn reference_context(node: &Node) -> ReferenceContext {
    let mut current = *node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "call" if is_field_of(&current, &parent, "function") => return ReferenceContext::Call,
            "decorator" => return ReferenceContext::Decorator,
            "type" => return ReferenceContext::Type,
            "argument_list" => {
                if parent.parent().is_some_and(|gp| gp.kind() == "class_definition") {
                    return ReferenceContext::Superclass;
                }
                return ReferenceContext::Value;
            }
            "attribute" => current = parent,
            _ => return ReferenceContext::Value,
        }
    }
    ReferenceContext::Value
}
