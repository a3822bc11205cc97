//! Core vocabulary shared by the parser plugins and the indexes.
//!
//! Everything here is a plain value type: symbols, dependencies, source
//! locations, scope chains, and the edit/result types returned by parser
//! operations. Ownership of these values lives with whichever index or
//! caller currently holds them; nothing in this module back-references
//! the indexes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classification of a named program entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Interface,
    Function,
    Method,
    Variable,
    Constant,
    Type,
    Enum,
    Module,
    Namespace,
}

impl SymbolKind {
    /// All kinds, in declaration order. Useful for histogram reporting.
    pub const ALL: [SymbolKind; 10] = [
        SymbolKind::Class,
        SymbolKind::Interface,
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Variable,
        SymbolKind::Constant,
        SymbolKind::Type,
        SymbolKind::Enum,
        SymbolKind::Module,
        SymbolKind::Namespace,
    ];

    /// Stable lowercase tag used in stats output and scope keys.
    pub fn tag(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Type => "type",
            SymbolKind::Enum => "enum",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Zero-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.line, self.column).cmp(&(other.line, other.column))
    }
}

/// Half-open source range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: Position) -> bool {
        position >= self.start && position <= self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A range anchored to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_path: PathBuf,
    pub range: Range,
}

impl Location {
    pub fn new(file_path: impl Into<PathBuf>, range: Range) -> Self {
        Self {
            file_path: file_path.into(),
            range,
        }
    }
}

/// Kind of lexical container a scope segment represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Module,
    Namespace,
    Class,
    Interface,
    Enum,
    Function,
    Method,
    Block,
}

impl ScopeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ScopeKind::Module => "module",
            ScopeKind::Namespace => "namespace",
            ScopeKind::Class => "class",
            ScopeKind::Interface => "interface",
            ScopeKind::Enum => "enum",
            ScopeKind::Function => "function",
            ScopeKind::Method => "method",
            ScopeKind::Block => "block",
        }
    }
}

/// One container in a scope chain. Anonymous containers carry no name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSegment {
    pub kind: ScopeKind,
    pub name: Option<String>,
}

impl ScopeSegment {
    pub fn new(kind: ScopeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
        }
    }

    pub fn anonymous(kind: ScopeKind) -> Self {
        Self { kind, name: None }
    }
}

/// Root-to-leaf chain of lexical containers.
///
/// Equality is full-path equality. Scopes are projected to a flat key
/// (`"class:Foo/method:bar"`) when inserted into the by-scope index view;
/// unnamed segments render as `anonymous`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Scope {
    segments: Vec<ScopeSegment>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<ScopeSegment>) -> Self {
        Self { segments }
    }

    pub fn push(&mut self, segment: ScopeSegment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<ScopeSegment> {
        self.segments.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ScopeSegment] {
        &self.segments
    }

    /// Flat root-to-leaf key: `"kind:name/kind:name/..."`.
    pub fn key(&self) -> String {
        self.segments
            .iter()
            .map(|s| {
                format!(
                    "{}:{}",
                    s.kind.tag(),
                    s.name.as_deref().unwrap_or("anonymous")
                )
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A named program entity extracted by a parser plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, location: Location) -> Self {
        Self {
            name: name.into(),
            kind,
            location,
            scope: None,
            modifiers: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        if !scope.is_empty() {
            self.scope = Some(scope);
        }
        self
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// Kind of a cross-file edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Import,
    Export,
    Inherit,
    Implement,
    Reference,
    Call,
}

/// Directed edge from a source file to a target path or module, as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Target path exactly as it appears in the source.
    pub path: String,
    pub kind: DependencyKind,
    pub is_relative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_symbols: Option<Vec<String>>,
}

impl Dependency {
    /// Create a dependency, deriving `is_relative` from the written path.
    pub fn new(path: impl Into<String>, kind: DependencyKind) -> Self {
        let path = path.into();
        let is_relative = path.starts_with("./") || path.starts_with("../") || path == "." || path == "..";
        Self {
            path,
            kind,
            is_relative,
            imported_symbols: None,
        }
    }

    pub fn with_imported_symbols(mut self, symbols: Vec<String>) -> Self {
        self.imported_symbols = Some(symbols);
        self
    }
}

/// A site where a symbol name occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub location: Location,
}

impl Reference {
    pub fn new(location: Location) -> Self {
        Self { location }
    }
}

/// Resolution target for a go-to-definition query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
}

/// How a usage site interacts with the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Declaration,
    Read,
    Write,
    Call,
}

/// A classified usage site of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub location: Location,
    pub kind: UsageKind,
}

/// A single text replacement produced by a refactoring operation.
///
/// An empty range (start == end) denotes an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEdit {
    pub file_path: PathBuf,
    pub range: Range,
    pub new_text: String,
}

impl CodeEdit {
    pub fn replace(file_path: impl Into<PathBuf>, range: Range, new_text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            range,
            new_text: new_text.into(),
        }
    }

    pub fn insert(file_path: impl Into<PathBuf>, at: Position, new_text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            range: Range::new(at, at),
            new_text: new_text.into(),
        }
    }

    pub fn is_insertion(&self) -> bool {
        self.range.start == self.range.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(1, 0) < Position::new(2, 0));
        assert!(Position::new(3, 4) < Position::new(3, 5));
        assert_eq!(Position::new(7, 7), Position::new(7, 7));
    }

    #[test]
    fn test_range_contains() {
        let range = Range::new(Position::new(10, 5), Position::new(15, 20));

        assert!(range.contains(Position::new(12, 0)));
        assert!(range.contains(Position::new(10, 5)));
        assert!(range.contains(Position::new(15, 20)));

        assert!(!range.contains(Position::new(9, 50)));
        assert!(!range.contains(Position::new(10, 4)));
        assert!(!range.contains(Position::new(15, 21)));
    }

    #[test]
    fn test_range_overlaps() {
        let a = Range::new(Position::new(1, 0), Position::new(5, 0));
        let b = Range::new(Position::new(4, 0), Position::new(8, 0));
        let c = Range::new(Position::new(6, 0), Position::new(7, 0));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_scope_key() {
        let mut scope = Scope::new();
        scope.push(ScopeSegment::new(ScopeKind::Module, "app"));
        scope.push(ScopeSegment::new(ScopeKind::Class, "Engine"));
        scope.push(ScopeSegment::anonymous(ScopeKind::Block));

        assert_eq!(scope.key(), "module:app/class:Engine/block:anonymous");
    }

    #[test]
    fn test_scope_equality_is_full_path() {
        let a = Scope::from_segments(vec![
            ScopeSegment::new(ScopeKind::Class, "Foo"),
            ScopeSegment::new(ScopeKind::Method, "bar"),
        ]);
        let b = Scope::from_segments(vec![ScopeSegment::new(ScopeKind::Method, "bar")]);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_symbol_builder() {
        let location = Location::new("/ws/a.ts", Range::default());
        let symbol = Symbol::new("foo", SymbolKind::Function, location)
            .with_modifier("export")
            .with_modifier("async");

        assert_eq!(symbol.name, "foo");
        assert!(symbol.has_modifier("export"));
        assert!(symbol.has_modifier("async"));
        assert!(!symbol.has_modifier("static"));
        assert!(symbol.scope.is_none());
    }

    #[test]
    fn test_symbol_with_empty_scope_stays_none() {
        let location = Location::new("/ws/a.ts", Range::default());
        let symbol = Symbol::new("x", SymbolKind::Variable, location).with_scope(Scope::new());
        assert!(symbol.scope.is_none());
    }

    #[test]
    fn test_dependency_relative_detection() {
        assert!(Dependency::new("./util", DependencyKind::Import).is_relative);
        assert!(Dependency::new("../lib/core", DependencyKind::Import).is_relative);
        assert!(!Dependency::new("react", DependencyKind::Import).is_relative);
        assert!(!Dependency::new("@scope/pkg", DependencyKind::Import).is_relative);
    }

    #[test]
    fn test_code_edit_insertion() {
        let insert = CodeEdit::insert("/ws/a.ts", Position::new(3, 0), "text");
        assert!(insert.is_insertion());

        let replace = CodeEdit::replace(
            "/ws/a.ts",
            Range::new(Position::new(0, 0), Position::new(0, 4)),
            "text",
        );
        assert!(!replace.is_insertion());
    }

    #[test]
    fn test_symbol_kind_tags() {
        assert_eq!(SymbolKind::Class.tag(), "class");
        assert_eq!(SymbolKind::Namespace.tag(), "namespace");
        assert_eq!(SymbolKind::ALL.len(), 10);
    }
}
