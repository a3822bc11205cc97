//! The parser plugin contract.
//!
//! This module defines the common interface every language implementation
//! honors. A plugin parses source to an opaque AST handle and answers all
//! later queries against that handle; no other component inspects the AST.

use std::any::Any;
use std::path::Path;

use crate::error::ParserResult;
use crate::types::{
    CodeEdit, Definition, Dependency, Position, Range, Reference, Symbol, Usage,
};

use super::language::Language;

bitflags::bitflags! {
    /// Feature gates callers consult before routing refactoring requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParserCapabilities: u8 {
        const RENAME           = 1 << 0;
        const EXTRACT_FUNCTION = 1 << 1;
        const GO_TO_DEFINITION = 1 << 2;
        const FIND_USAGES      = 1 << 3;
        const CODE_ACTIONS     = 1 << 4;
    }
}

/// Opaque AST handle.
///
/// The plugin that produced a handle is the only component allowed to
/// interpret it; everyone else just carries it between calls. A plugin
/// must not mutate a handle it returned earlier unless explicitly asked.
pub trait Ast: Any + Send + Sync {
    /// Enable downcasting to the plugin's concrete AST type.
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ast").finish_non_exhaustive()
    }
}

/// Outcome of a plugin self-check, run once during registry
/// initialization.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Common interface for all language parsers.
///
/// Identity fields (`name`, `version`, `supported_extensions`,
/// `supported_languages`) are immutable for the plugin's lifetime.
pub trait ParserPlugin: Send + Sync {
    /// Unique plugin name; the registry's primary key.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Dot-prefixed extensions this plugin handles.
    fn supported_extensions(&self) -> &[&str];

    fn supported_languages(&self) -> &[Language];

    fn capabilities(&self) -> ParserCapabilities;

    /// Parse source code into an AST handle.
    ///
    /// Syntax errors fail with `ParserError::Parse` carrying the offending
    /// location and, when known, the syntax element.
    fn parse(&self, source: &str, file_path: &Path) -> ParserResult<Box<dyn Ast>>;

    fn extract_symbols(&self, ast: &dyn Ast) -> ParserResult<Vec<Symbol>>;

    fn extract_dependencies(&self, ast: &dyn Ast) -> ParserResult<Vec<Dependency>>;

    fn find_references(&self, ast: &dyn Ast, symbol: &Symbol) -> ParserResult<Vec<Reference>>;

    fn rename(
        &self,
        ast: &dyn Ast,
        position: Position,
        new_name: &str,
    ) -> ParserResult<Vec<CodeEdit>>;

    fn extract_function(&self, ast: &dyn Ast, range: Range) -> ParserResult<Vec<CodeEdit>>;

    fn find_definition(
        &self,
        ast: &dyn Ast,
        position: Position,
    ) -> ParserResult<Option<Definition>>;

    fn find_usages(&self, ast: &dyn Ast, symbol: &Symbol) -> ParserResult<Vec<Usage>>;

    /// Self-check used once during registry initialization.
    fn validate(&self) -> ValidationResult;

    /// Idempotent release of internal resources.
    fn dispose(&self);
}

impl std::fmt::Debug for dyn ParserPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserPlugin")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// Maximum recursion depth for AST traversal to prevent stack overflow.
///
/// Deeply nested structures (large array initializers, chained calls) can
/// otherwise blow the stack; subtrees past this depth are skipped.
pub const MAX_AST_DEPTH: usize = 500;

/// Check whether recursion may continue at this depth.
///
/// All plugins call this at the top of their recursive walks; a `false`
/// return means the subtree is skipped with a debug log.
#[inline]
pub fn check_recursion_depth(depth: usize, line: u32, column: u32) -> bool {
    if depth > MAX_AST_DEPTH {
        tracing::debug!(
            "max AST depth ({MAX_AST_DEPTH}) exceeded at {}:{}; skipping subtree",
            line + 1,
            column + 1
        );
        return false;
    }
    true
}

/// Structural check the registry applies at registration time.
pub(crate) fn check_plugin_contract(plugin: &dyn ParserPlugin) -> Result<(), String> {
    if plugin.name().is_empty() {
        return Err("plugin name must be non-empty".into());
    }
    if plugin.version().is_empty() {
        return Err("plugin version must be non-empty".into());
    }
    if plugin.supported_extensions().is_empty() {
        return Err("plugin must declare at least one extension".into());
    }
    for ext in plugin.supported_extensions() {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(format!("extension '{ext}' must start with a dot"));
        }
    }
    if plugin.supported_languages().is_empty() {
        return Err("plugin must declare at least one language".into());
    }
    Ok(())
}
