//! TypeScript parser plugin built on tree-sitter.
//!
//! Handles `.ts` and `.tsx` sources. The AST handle owns the parsed tree
//! plus the source text; every query walks the real tree rather than
//! pattern-matching on text.

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

const EXTENSIONS: [&str; 2] = [".ts", ".tsx"];
const LANGUAGES: [Language; 1] = [Language::TypeScript];

/// Parser plugin for TypeScript and TSX.
pub struct TypeScriptParser {
    parser: Mutex<Parser>,
}

/// Owned parse result; opaque outside this module.
struct TypeScriptAst {
    tree: Tree,
    source: String,
    file_path: PathBuf,
    line_offsets: Vec<usize>,
}

impl Ast for TypeScriptAst {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TypeScriptAst {
    fn text(&self, node: Node) -> &str {
        &self.source[node.byte_range()]
    }

    fn location(&self, node: Node) -> Location {
        Location::new(self.file_path.clone(), node_range(node))
    }

    /// Byte offset for a position, clamped to the source length.
    fn byte_at(&self, position: Position) -> usize {
        let line_start = self
            .line_offsets
            .get(position.line as usize)
            .copied()
            .unwrap_or(self.source.len());
        (line_start + position.column as usize).min(self.source.len())
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

fn line_offsets(source: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn is_identifier_node(node: Node) -> bool {
    matches!(
        node.kind(),
        "identifier"
            | "property_identifier"
            | "type_identifier"
            | "shorthand_property_identifier"
            | "shorthand_property_identifier_pattern"
    )
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Locate the first ERROR or missing node under `node`, if any.
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

impl TypeScriptParser {
    pub fn new() -> ParserResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|e| {
                ParserError::operation("init", format!("failed to load TypeScript grammar: {e}"))
            })?;
        Ok(Self {
            parser: Mutex::new(parser),
        })
    }

    fn downcast<'a>(&self, ast: &'a dyn Ast) -> ParserResult<&'a TypeScriptAst> {
        ast.as_any().downcast_ref::<TypeScriptAst>().ok_or_else(|| {
            ParserError::operation("ast", "AST handle was not produced by the TypeScript parser")
        })
    }

    /// Smallest named identifier-like node at a position.
    fn identifier_at<'a>(&self, ast: &'a TypeScriptAst, position: Position) -> Option<Node<'a>> {
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

    fn collect_identifiers<'a>(&self, ast: &'a TypeScriptAst, name: &str) -> Vec<Node<'a>> {
        let mut nodes = Vec::new();
        collect_matching_identifiers(ast, ast.tree.root_node(), name, &mut nodes, 0);
        nodes
    }
}

impl ParserPlugin for TypeScriptParser {
    fn name(&self) -> &str {
        "typescript"
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
            | ParserCapabilities::EXTRACT_FUNCTION
            | ParserCapabilities::GO_TO_DEFINITION
            | ParserCapabilities::FIND_USAGES
    }

    fn parse(&self, source: &str, file_path: &Path) -> ParserResult<Box<dyn Ast>> {
        let tsx = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"));
        let grammar: tree_sitter::Language = if tsx {
            tree_sitter_typescript::LANGUAGE_TSX.into()
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        };

        let tree = {
            let mut parser = self.parser.lock();
            parser.set_language(&grammar).map_err(|e| {
                ParserError::operation("init", format!("failed to load grammar: {e}"))
            })?;
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

        Ok(Box::new(TypeScriptAst {
            tree,
            line_offsets: line_offsets(source),
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
        if !is_valid_identifier(new_name) {
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

    fn extract_function(&self, ast: &dyn Ast, range: Range) -> ParserResult<Vec<CodeEdit>> {
        let ast = self.downcast(ast)?;
        extract_function_edits(ast, range)
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
        let probe = "export class __Probe { run(): void {} }\nexport function __probe(): void {}\n";
        match self.parse(probe, Path::new("__probe__.ts")) {
            Ok(ast) => match self.extract_symbols(ast.as_ref()) {
                Ok(symbols) => {
                    let has_class = symbols.iter().any(|s| s.kind == SymbolKind::Class);
                    let has_function = symbols.iter().any(|s| s.kind == SymbolKind::Function);
                    if has_class && has_function {
                        ValidationResult::ok()
                    } else {
                        ValidationResult::invalid("probe symbols missing from extraction")
                    }
                }
                Err(e) => ValidationResult::invalid(format!("probe extraction failed: {e}")),
            },
            Err(e) => ValidationResult::invalid(format!("probe parse failed: {e}")),
        }
    }

    fn dispose(&self) {
        // The grammar and parser state are freed on drop; nothing else to
        // release. Kept idempotent.
        tracing::debug!("[typescript] disposed");
    }
}

/// Recursive symbol walk mirroring the grammar's declaration forms.
fn collect_symbols(
    ast: &TypeScriptAst,
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
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Class, scope));
                scope.push(ScopeSegment::new(ScopeKind::Class, ast.text(name)));
                pushed = true;
            }
        }
        "interface_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Interface, scope));
                scope.push(ScopeSegment::new(ScopeKind::Interface, ast.text(name)));
                pushed = true;
            }
        }
        "enum_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Enum, scope));
                scope.push(ScopeSegment::new(ScopeKind::Enum, ast.text(name)));
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
        "method_definition" | "method_signature" | "abstract_method_signature" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Method, scope));
                scope.push(ScopeSegment::new(ScopeKind::Method, ast.text(name)));
                pushed = true;
            }
        }
        "type_alias_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Type, scope));
            }
        }
        "internal_module" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Namespace, scope));
                scope.push(ScopeSegment::new(ScopeKind::Namespace, ast.text(name)));
                pushed = true;
            }
        }
        "module" => {
            if let Some(name) = node.child_by_field_name("name") {
                symbols.push(make_symbol(ast, node, name, SymbolKind::Module, scope));
                scope.push(ScopeSegment::new(ScopeKind::Module, ast.text(name)));
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
        "public_field_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
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
    ast: &TypeScriptAst,
    declaration: Node,
    name_node: Node,
    kind: SymbolKind,
    scope: &Scope,
) -> Symbol {
    let mut symbol = Symbol::new(ast.text(name_node), kind, ast.location(name_node));
    if !scope.is_empty() {
        symbol = symbol.with_scope(scope.clone());
    }
    symbol.with_modifiers(collect_modifiers(ast, declaration))
}

fn collect_modifiers(ast: &TypeScriptAst, declaration: Node) -> Vec<String> {
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
            "abstract" => modifiers.push("abstract".to_string()),
            "readonly" => modifiers.push("readonly".to_string()),
            "accessibility_modifier" => modifiers.push(ast.text(child).to_string()),
            _ => {}
        }
    }
    modifiers
}

fn collect_dependencies(
    ast: &TypeScriptAst,
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
            // Only re-exports (`export ... from 'x'`) are edges.
            if let Some(source) = node.child_by_field_name("source") {
                let mut dependency =
                    Dependency::new(strip_quotes(ast.text(source)), DependencyKind::Export);
                let names = exported_names(ast, node);
                if !names.is_empty() {
                    dependency = dependency.with_imported_symbols(names);
                }
                dependencies.push(dependency);
            }
        }
        "extends_clause" | "extends_type_clause" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(child.kind(), "identifier" | "type_identifier" | "member_expression" | "generic_type") {
                    let text = base_type_name(ast, child);
                    dependencies.push(Dependency::new(text, DependencyKind::Inherit));
                }
            }
        }
        "implements_clause" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                let text = base_type_name(ast, child);
                dependencies.push(Dependency::new(text, DependencyKind::Implement));
            }
        }
        "call_expression" => {
            // CommonJS require("x")
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

/// For `Base`, `ns.Base`, or `Base<T>`, the name as written without type
/// arguments.
fn base_type_name(ast: &TypeScriptAst, node: Node) -> String {
    if node.kind() == "generic_type" {
        if let Some(name) = node.child_by_field_name("name") {
            return ast.text(name).to_string();
        }
    }
    ast.text(node).to_string()
}

fn imported_names(ast: &TypeScriptAst, import: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = import.walk();
    for child in import.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for clause_child in child.named_children(&mut clause_cursor) {
            match clause_child.kind() {
                // Default import
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

fn exported_names(ast: &TypeScriptAst, export: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = export.walk();
    for child in export.children(&mut cursor) {
        if child.kind() != "export_clause" {
            continue;
        }
        let mut specs = child.walk();
        for spec in child.named_children(&mut specs) {
            if spec.kind() == "export_specifier" {
                if let Some(name) = spec.child_by_field_name("name") {
                    names.push(ast.text(name).to_string());
                }
            }
        }
    }
    names
}

fn collect_matching_identifiers<'a>(
    ast: &'a TypeScriptAst,
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
        | "abstract_class_declaration"
        | "interface_declaration"
        | "enum_declaration"
        | "type_alias_declaration"
        | "method_definition"
        | "variable_declarator"
        | "internal_module"
        | "module"
        | "required_parameter" => {
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

/// Extract the statements covered by `range` into a new function, leaving
/// a call behind. Boundaries snap to whole statements of the enclosing
/// block.
fn extract_function_edits(ast: &TypeScriptAst, range: Range) -> ParserResult<Vec<CodeEdit>> {
    let start_byte = ast.byte_at(range.start);
    let end_byte = ast.byte_at(range.end).max(start_byte);
    let root = ast.tree.root_node();

    let anchor = root
        .named_descendant_for_byte_range(start_byte, end_byte)
        .unwrap_or(root);

    // Nearest container whose direct children are statements.
    let mut container = anchor;
    while container.kind() != "statement_block" && container.kind() != "program" {
        match container.parent() {
            Some(parent) => container = parent,
            None => break,
        }
    }

    let mut cursor = container.walk();
    let covered: Vec<Node> = container
        .named_children(&mut cursor)
        .filter(|statement| {
            statement.start_byte() < end_byte && statement.end_byte() > start_byte
        })
        .collect();

    let (Some(first), Some(last)) = (covered.first(), covered.last()) else {
        return Err(ParserError::operation(
            "extract-function",
            "range does not cover any statements",
        ));
    };

    let body = ast.source[first.start_byte()..last.end_byte()].to_string();
    let replaced = Range::new(
        point_to_position(first.start_position()),
        point_to_position(last.end_position()),
    );

    // Insert after the enclosing function when there is one, else at the
    // end of the file.
    let mut insertion_anchor = container;
    while !matches!(
        insertion_anchor.kind(),
        "function_declaration" | "generator_function_declaration" | "method_definition" | "program"
    ) {
        match insertion_anchor.parent() {
            Some(parent) => insertion_anchor = parent,
            None => break,
        }
    }
    let insert_at = point_to_position(insertion_anchor.end_position());

    Ok(vec![
        CodeEdit::replace(ast.file_path.clone(), replaced, "extracted();"),
        CodeEdit::insert(
            ast.file_path.clone(),
            insert_at,
            format!("\n\nfunction extracted(): void {{\n    {body}\n}}"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TypeScriptParser {
        TypeScriptParser::new().unwrap()
    }

    fn parse(source: &str) -> Box<dyn Ast> {
        parser().parse(source, Path::new("/ws/test.ts")).unwrap()
    }

    fn symbols_of(source: &str) -> Vec<Symbol> {
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();
        p.extract_symbols(ast.as_ref()).unwrap()
    }

    #[test]
    fn test_parse_reports_syntax_error_location() {
        let err = parser()
            .parse("export function broken(", Path::new("/ws/bad.ts"))
            .unwrap_err();
        match err {
            ParserError::Parse { message, .. } => {
                assert!(!message.is_empty());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_function_and_class() {
        let symbols = symbols_of("export function foo(){}\nexport class Bar{}\n");

        let foo = symbols.iter().find(|s| s.name == "foo").unwrap();
        assert_eq!(foo.kind, SymbolKind::Function);
        assert!(foo.has_modifier("export"));

        let bar = symbols.iter().find(|s| s.name == "Bar").unwrap();
        assert_eq!(bar.kind, SymbolKind::Class);
    }

    #[test]
    fn test_method_scope_chain() {
        let source = "class Calculator {\n  add(a: number, b: number): number { return a + b; }\n}\n";
        let symbols = symbols_of(source);

        let add = symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.kind, SymbolKind::Method);
        assert_eq!(add.scope.as_ref().unwrap().key(), "class:Calculator");
    }

    #[test]
    fn test_interface_enum_type_namespace() {
        let source = r#"
interface Shape { area(): number; }
enum Color { Red, Green }
type Alias = string;
namespace util { export const x = 1; }
"#;
        let symbols = symbols_of(source);
        let kind_of = |name: &str| symbols.iter().find(|s| s.name == name).unwrap().kind;

        assert_eq!(kind_of("Shape"), SymbolKind::Interface);
        assert_eq!(kind_of("Color"), SymbolKind::Enum);
        assert_eq!(kind_of("Alias"), SymbolKind::Type);
        assert_eq!(kind_of("util"), SymbolKind::Namespace);

        let x = symbols.iter().find(|s| s.name == "x").unwrap();
        assert_eq!(x.kind, SymbolKind::Constant);
        assert_eq!(x.scope.as_ref().unwrap().key(), "namespace:util");
    }

    #[test]
    fn test_const_vs_let() {
        let symbols = symbols_of("const a = 1;\nlet b = 2;\nvar c = 3;\n");
        let kind_of = |name: &str| symbols.iter().find(|s| s.name == name).unwrap().kind;

        assert_eq!(kind_of("a"), SymbolKind::Constant);
        assert_eq!(kind_of("b"), SymbolKind::Variable);
        assert_eq!(kind_of("c"), SymbolKind::Variable);
    }

    #[test]
    fn test_static_and_accessibility_modifiers() {
        let source = "class S {\n  private static helper(): void {}\n}\n";
        let symbols = symbols_of(source);
        let helper = symbols.iter().find(|s| s.name == "helper").unwrap();

        assert!(helper.has_modifier("static"));
        assert!(helper.has_modifier("private"));
    }

    #[test]
    fn test_import_dependencies() {
        let source = r#"
import { readFile, writeFile } from "./fs-utils";
import axios from "axios";
import * as path from "path";
export { helper } from "../shared/helper";
"#;
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();
        let deps = p.extract_dependencies(ast.as_ref()).unwrap();

        let fs = deps.iter().find(|d| d.path == "./fs-utils").unwrap();
        assert_eq!(fs.kind, DependencyKind::Import);
        assert!(fs.is_relative);
        assert_eq!(
            fs.imported_symbols.as_deref().unwrap(),
            ["readFile".to_string(), "writeFile".to_string()]
        );

        let ax = deps.iter().find(|d| d.path == "axios").unwrap();
        assert!(!ax.is_relative);
        assert_eq!(ax.imported_symbols.as_deref().unwrap(), ["axios".to_string()]);

        let ns = deps.iter().find(|d| d.path == "path").unwrap();
        assert_eq!(ns.imported_symbols.as_deref().unwrap(), ["path".to_string()]);

        let re = deps.iter().find(|d| d.path == "../shared/helper").unwrap();
        assert_eq!(re.kind, DependencyKind::Export);
        assert!(re.is_relative);
    }

    #[test]
    fn test_inherit_and_implement_dependencies() {
        let source = "interface Base {}\nclass Impl extends Object implements Base {}\n";
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();
        let deps = p.extract_dependencies(ast.as_ref()).unwrap();

        assert!(deps
            .iter()
            .any(|d| d.kind == DependencyKind::Inherit && d.path == "Object"));
        assert!(deps
            .iter()
            .any(|d| d.kind == DependencyKind::Implement && d.path == "Base"));
    }

    #[test]
    fn test_find_references() {
        let source = "function used(){}\nused();\nconst x = used;\n";
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();
        let symbol = p
            .extract_symbols(ast.as_ref())
            .unwrap()
            .into_iter()
            .find(|s| s.name == "used")
            .unwrap();

        let references = p.find_references(ast.as_ref(), &symbol).unwrap();
        assert_eq!(references.len(), 3);
    }

    #[test]
    fn test_find_definition_from_call_site() {
        let source = "function target(){}\ntarget();\n";
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();

        // Position inside the call on line 1.
        let definition = p
            .find_definition(ast.as_ref(), Position::new(1, 2))
            .unwrap()
            .unwrap();
        assert_eq!(definition.name, "target");
        assert_eq!(definition.kind, SymbolKind::Function);
        assert_eq!(definition.location.range.start.line, 0);
    }

    #[test]
    fn test_find_usages_classification() {
        let source = "let counter = 0;\ncounter = 1;\nconst v = counter;\n";
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();
        let symbol = p
            .extract_symbols(ast.as_ref())
            .unwrap()
            .into_iter()
            .find(|s| s.name == "counter")
            .unwrap();

        let usages = p.find_usages(ast.as_ref(), &symbol).unwrap();
        assert_eq!(usages.len(), 3);
        assert_eq!(usages[0].kind, UsageKind::Declaration);
        assert_eq!(usages[1].kind, UsageKind::Write);
        assert_eq!(usages[2].kind, UsageKind::Read);
    }

    #[test]
    fn test_rename_produces_edit_per_site() {
        let source = "function oldName(){}\noldName();\n";
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();

        let edits = p
            .rename(ast.as_ref(), Position::new(0, 11), "newName")
            .unwrap();
        assert_eq!(edits.len(), 2);
        assert!(edits.iter().all(|e| e.new_text == "newName"));

        let err = p
            .rename(ast.as_ref(), Position::new(0, 11), "1bad")
            .unwrap_err();
        assert!(matches!(err, ParserError::Operation { code: "rename", .. }));
    }

    #[test]
    fn test_extract_function_produces_call_and_declaration() {
        let source = "function run(){\n    const a = 1;\n    const b = 2;\n}\n";
        let p = parser();
        let ast = p.parse(source, Path::new("/ws/test.ts")).unwrap();

        let range = Range::new(Position::new(1, 0), Position::new(2, 16));
        let edits = p.extract_function(ast.as_ref(), range).unwrap();

        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].new_text, "extracted();");
        assert!(edits[1].is_insertion());
        assert!(edits[1].new_text.contains("function extracted"));
        assert!(edits[1].new_text.contains("const a = 1;"));
    }

    #[test]
    fn test_extract_function_empty_range_fails() {
        let p = parser();
        let ast = parse("const a = 1;\n");
        // A range that covers no statements (far past the end).
        let range = Range::new(Position::new(5, 0), Position::new(5, 0));
        assert!(p.extract_function(ast.as_ref(), range).is_err());
    }

    #[test]
    fn test_tsx_parses() {
        let p = parser();
        let source = "export function View() { return <div>hello</div>; }\n";
        let ast = p.parse(source, Path::new("/ws/View.tsx")).unwrap();
        let symbols = p.extract_symbols(ast.as_ref()).unwrap();
        assert!(symbols.iter().any(|s| s.name == "View"));
    }

    #[test]
    fn test_validate_passes() {
        assert!(parser().validate().valid);
    }
}
