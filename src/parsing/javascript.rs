//! JavaScript parser plugin built on tree-sitter.
//!
//! Handles `.js`, `.jsx`, `.mjs`, and `.cjs` sources. Smaller surface
//! than the TypeScript plugin: no interfaces, enums, type aliases, or
//! namespaces.

use parking_lot::Mutex;
use std::any::Any;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Point, Tree};

use crate::error::{ParserError, ParserResult};
use crate::types::{
    CodeEdit, Definition, Dependency, DependencyKind, Location, Position, Range, Reference, Scope,
    ScopeKind, ScopeSegment, Symbol, SymbolKind, Usage, UsageKind,
};

use super::language::Language;
use super::parser::{
    Ast, ParserCapabilities, ParserPlugin, ValidationResult, check_recursion_depth,
};

const EXTENSIONS: [&str; 4] = [".js", ".jsx", ".mjs", ".cjs"];
const LANGUAGES: [Language; 1] = [Language::JavaScript];

/// Parser plugin for JavaScript and JSX.
pub struct JavaScriptParser {
    parser: Mutex<Parser>,
}

struct JavaScriptAst {
    tree: Tree,
    source: String,
    file_path: PathBuf,
}

impl Ast for JavaScriptAst {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl JavaScriptAst {
    fn text(&self, node: Node) -> &str {
        &self.source[node.byte_range()]
    }

    fn location(&self, node: Node) -> Location {
        Location::new(self.file_path.clone(), node_range(node))
    }
}

fn point_to_position(point: Point) -> Position {
    Position::new(point.row as u32, point.column as u32)
}

fn node_range(node: Node) -> Range {
    Range::new(
        point_to_position(node.start_position()),
        point_to_position(node.end_position()),
    )
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn is_identifier_node(node: Node) -> bool {
    matches!(
        node.kind(),
        "identifier" | "property_identifier" | "shorthand_property_identifier"
    )
}

fn first_error_node(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    Some(node)
}

impl JavaScriptParser {
    pub fn new() -> ParserResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| {
                ParserError::operation("init", format!("failed to load JavaScript grammar: {e}"))
            })?;
        Ok(Self {
            parser: Mutex::new(parser),
        })
    }

    fn downcast<'a>(&self, ast: &'a dyn Ast) -> ParserResult<&'a JavaScriptAst> {
        ast.as_any().downcast_ref::<JavaScriptAst>().ok_or_else(|| {
            ParserError::operation("ast", "AST handle was not produced by the JavaScript parser")
        })
    }

    fn identifier_at<'a>(&self, ast: &'a JavaScriptAst, position: Position) -> Option<Node<'a>> {
        let point = Point {
            row: position.line as usize,
            column: position.column as usize,
        };
        let node = ast
            .tree
            .root_node()
            .named_descendant_for_point_range(point, point)?;
        is_identifier_node(node).then_some(node)
    }

    fn collect_identifiers<'a>(&self, ast: &'a JavaScriptAst, name: &str) -> Vec<Node<'a>> {
        let mut nodes = Vec::new();
        collect_matching_identifiers(ast, ast.tree.root_node(), name, &mut nodes, 0);
        nodes
    }
}

impl ParserPlugin for JavaScriptParser {
    fn name(&self) -> &str {
        "javascript"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn supported_extensions(&self) -> &[&str] {
        &EXTENSIONS
    }

    fn supported_languages(&self) -> &[Language] {
        &LANGUAGES
    }

    fn capabilities(&self) -> ParserCapabilities {
        ParserCapabilities::RENAME
            | ParserCapabilities::GO_TO_DEFINITION
            | ParserCapabilities::FIND_USAGES
    }

    fn parse(&self, source: &str, file_path: &Path) -> ParserResult<Box<dyn Ast>> {
        let tree = {
            let mut parser = self.parser.lock();
            parser.parse(source, None).ok_or_else(|| ParserError::Parse {
                line: 0,
                column: 0,
                message: "parser produced no tree".into(),
                syntax_element: None,
            })?
        };

        if tree.root_node().has_error() {
            let node = first_error_node(tree.root_node()).unwrap_or_else(|| tree.root_node());
            let point = node.start_position();
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "unexpected or incomplete syntax".to_string()
            };
            return Err(ParserError::Parse {
                line: point.row as u32,
                column: point.column as u32,
                message,
                syntax_element: Some(node.kind().to_string()),
            });
        }

        Ok(Box::new(JavaScriptAst {
            tree,
            source: source.to_string(),
            file_path: file_path.to_path_buf(),
        }))
    }

    fn extract_symbols(&self, ast: &dyn Ast) -> ParserResult<Vec<Symbol>> {
        let ast = self.downcast(ast)?;
        let mut symbols = Vec::new();
        let mut scope = Scope::new();
        collect_symbols(ast, ast.tree.root_node(), &mut scope, &mut symbols, 0);
        Ok(symbols)
    }

    fn extract_dependencies(&self, ast: &dyn Ast) -> ParserResult<Vec<Dependency>> {
        let ast = self.downcast(ast)?;
        let mut dependencies = Vec::new();
        collect_dependencies(ast, ast.tree.root_node(), &mut dependencies, 0);
        Ok(dependencies)
    }

    fn find_references(&self, ast: &dyn Ast, symbol: &Symbol) -> ParserResult<Vec<Reference>> {
        let ast = self.downcast(ast)?;
        Ok(self
            .collect_identifiers(ast, &symbol.name)
            .into_iter()
            .map(|node| Reference::new(ast.location(node)))
            .collect())
    }

    fn rename(
        &self,
        ast: &dyn Ast,
        position: Position,
        new_name: &str,
    ) -> ParserResult<Vec<CodeEdit>> {
        let ast = self.downcast(ast)?;
        let valid = new_name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
            && new_name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if !valid {
            return Err(ParserError::operation(
                "rename",
                format!("'{new_name}' is not a valid identifier"),
            ));
        }
        let target = self.identifier_at(ast, position).ok_or_else(|| {
            ParserError::operation_at(
                "rename",
                "no identifier at position",
                position.line,
                position.column,
            )
        })?;
        let name = ast.text(target).to_string();

        Ok(self
            .collect_identifiers(ast, &name)
            .into_iter()
            .map(|node| CodeEdit::replace(ast.file_path.clone(), node_range(node), new_name))
            .collect())
    }

    fn extract_function(&self, _ast: &dyn Ast, _range: Range) -> ParserResult<Vec<CodeEdit>> {
        Err(ParserError::Unsupported {
            operation: "extract_function",
        })
    }

    fn find_definition(
        &self,
        ast: &dyn Ast,
        position: Position,
    ) -> ParserResult<Option<Definition>> {
        let ast = self.downcast(ast)?;
        let Some(node) = self.identifier_at(ast, position) else {
            return Ok(None);
        };
        let name = ast.text(node).to_string();

        let mut symbols = Vec::new();
        let mut scope = Scope::new();
        collect_symbols(ast, ast.tree.root_node(), &mut scope, &mut symbols, 0);

        Ok(symbols.into_iter().find(|s| s.name == name).map(|s| Definition {
            name: s.name,
            kind: s.kind,
            location: s.location,
        }))
    }

    fn find_usages(&self, ast: &dyn Ast, symbol: &Symbol) -> ParserResult<Vec<Usage>> {
        let ast = self.downcast(ast)?;
        Ok(self
            .collect_identifiers(ast, &symbol.name)
            .into_iter()
            .map(|node| Usage {
                location: ast.location(node),
                kind: classify_usage(node),
            })
            .collect())
    }

    fn validate(&self) -> ValidationResult {
        let probe = "export class Probe { run() {} }\nexport function probe() {}\n";
        match self.parse(probe, Path::new("__probe__.js")) {
            Ok(ast) => match self.extract_symbols(ast.as_ref()) {
                Ok(symbols) if symbols.iter().any(|s| s.kind == SymbolKind::Class) => {
                    ValidationResult::ok()
                }
                Ok(_) => ValidationResult::invalid("probe symbols missing from extraction"),
                Err(e) => ValidationResult::invalid(format!("probe extraction failed: {e}")),
            },
            Err(e) => ValidationResult::invalid(format!("probe parse failed: {e}")),
        }
    }

    fn dispose(&self) {
        tracing::debug!("[javascript] disposed");
    }
}

fn collect_symbols(
    ast: &JavaScriptAst,
    node: Node,
    scope: &mut Scope,
    symbols: &mut Vec<Symbol>,
    depth: usize,
) {
    let point = node.start_position();
    if !check_recursion_depth(depth, point.row as u32, point.column as u32) {
        return;
    }

    let mut pushed = false;
    match node.kind() {
        "class_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Class, scope));
                scope.push(ScopeSegment::new(ScopeKind::Class, ast.text(name)));
                pushed = true;
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Function, scope));
                scope.push(ScopeSegment::new(ScopeKind::Function, ast.text(name)));
                pushed = true;
            }
        }
        "method_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Method, scope));
                scope.push(ScopeSegment::new(ScopeKind::Method, ast.text(name)));
                pushed = true;
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let is_const = node.child(0).is_some_and(|c| c.kind() == "const");
            let kind = if is_const {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = declarator.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        symbols.push(make_symbol(ast, node, name, kind, scope));
                    }
                }
            }
        }
        "field_definition" => {
            if let Some(name) = node.child_by_field_name("property") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Variable, scope));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_symbols(ast, child, scope, symbols, depth + 1);
    }
    if pushed {
        scope.pop();
    }
}

fn make_symbol(
    ast: &JavaScriptAst,
    declaration: Node,
    name_node: Node,
    kind: SymbolKind,
    scope: &Scope,
) -> Symbol {
    let mut modifiers = Vec::new();
    if let Some(parent) = declaration.parent() {
        if parent.kind() == "export_statement" {
            modifiers.push("export".to_string());
            let mut cursor = parent.walk();
            if parent.children(&mut cursor).any(|c| c.kind() == "default") {
                modifiers.push("default".to_string());
            }
        }
    }
    let mut cursor = declaration.walk();
    for child in declaration.children(&mut cursor) {
        match child.kind() {
            "static" => modifiers.push("static".to_string()),
            "async" => modifiers.push("async".to_string()),
            _ => {}
        }
    }

    let mut symbol = Symbol::new(ast.text(name_node), kind, ast.location(name_node));
    if !scope.is_empty() {
        symbol = symbol.with_scope(scope.clone());
    }
    symbol.with_modifiers(modifiers)
}

fn collect_dependencies(
    ast: &JavaScriptAst,
    node: Node,
    dependencies: &mut Vec<Dependency>,
    depth: usize,
) {
    let point = node.start_position();
    if !check_recursion_depth(depth, point.row as u32, point.column as u32) {
        return;
    }

    match node.kind() {
        "import_statement" => {
            if let Some(source) = node.child_by_field_name("source") {
                let mut dependency =
                    Dependency::new(strip_quotes(ast.text(source)), DependencyKind::Import);
                let names = imported_names(ast, node);
                if !names.is_empty() {
                    dependency = dependency.with_imported_symbols(names);
                }
                dependencies.push(dependency);
            }
        }
        "export_statement" => {
            if let Some(source) = node.child_by_field_name("source") {
                dependencies.push(Dependency::new(
                    strip_quotes(ast.text(source)),
                    DependencyKind::Export,
                ));
            }
        }
        "class_heritage" => {
            // `class X extends Base`
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(child.kind(), "identifier" | "member_expression") {
                    dependencies
                        .push(Dependency::new(ast.text(child), DependencyKind::Inherit));
                }
            }
        }
        "call_expression" => {
            if let Some(function) = node.child_by_field_name("function") {
                if ast.text(function) == "require" {
                    if let Some(arguments) = node.child_by_field_name("arguments") {
                        let mut cursor = arguments.walk();
                        if let Some(arg) = arguments
                            .named_children(&mut cursor)
                            .find(|c| c.kind() == "string")
                        {
                            dependencies.push(Dependency::new(
                                strip_quotes(ast.text(arg)),
                                DependencyKind::Import,
                            ));
                        }
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_dependencies(ast, child, dependencies, depth + 1);
    }
}

fn imported_names(ast: &JavaScriptAst, import: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = import.walk();
    for child in import.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for clause_child in child.named_children(&mut clause_cursor) {
            match clause_child.kind() {
                "identifier" => names.push(ast.text(clause_child).to_string()),
                "named_imports" => {
                    let mut specs = clause_child.walk();
                    for spec in clause_child.named_children(&mut specs) {
                        if spec.kind() == "import_specifier" {
                            if let Some(name) = spec.child_by_field_name("name") {
                                names.push(ast.text(name).to_string());
                            }
                        }
                    }
                }
                "namespace_import" => {
                    let mut ns = clause_child.walk();
                    if let Some(alias) = clause_child
                        .named_children(&mut ns)
                        .find(|c| c.kind() == "identifier")
                    {
                        names.push(ast.text(alias).to_string());
                    }
                }
                _ => {}
            }
        }
    }
    names
}

fn collect_matching_identifiers<'a>(
    ast: &'a JavaScriptAst,
    node: Node<'a>,
    name: &str,
    out: &mut Vec<Node<'a>>,
    depth: usize,
) {
    let point = node.start_position();
    if !check_recursion_depth(depth, point.row as u32, point.column as u32) {
        return;
    }
    if is_identifier_node(node) && ast.text(node) == name {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_matching_identifiers(ast, child, name, out, depth + 1);
    }
}

fn classify_usage(node: Node) -> UsageKind {
    let Some(parent) = node.parent() else {
        return UsageKind::Read;
    };
    match parent.kind() {
        "call_expression" => {
            if parent
                .child_by_field_name("function")
                .is_some_and(|f| f.id() == node.id())
            {
                UsageKind::Call
            } else {
                UsageKind::Read
            }
        }
        "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "method_definition"
        | "variable_declarator" => {
            if parent
                .child_by_field_name("name")
                .is_some_and(|n| n.id() == node.id())
            {
                UsageKind::Declaration
            } else {
                UsageKind::Read
            }
        }
        "assignment_expression" | "augmented_assignment_expression" => {
            if parent
                .child_by_field_name("left")
                .is_some_and(|l| l.id() == node.id())
            {
                UsageKind::Write
            } else {
                UsageKind::Read
            }
        }
        _ => UsageKind::Read,
    }
}
