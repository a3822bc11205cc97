//! Parser plugin framework.
//!
//! Every language lives behind the `ParserPlugin` contract: parse to an
//! opaque AST handle, then answer symbol/dependency/reference queries
//! against it. The registry dispatches by extension or language with
//! priority ordering; the factory adds lazy construction on first demand.

pub mod factory;
pub mod javascript;
pub mod language;
pub mod parser;
pub mod registry;
pub mod typescript;

pub use factory::ParserFactory;
pub use javascript::JavaScriptParser;
pub use language::Language;
pub use parser::{Ast, ParserCapabilities, ParserPlugin, ValidationResult};
pub use registry::{ParserRegistry, RegisterOptions};
pub use typescript::TypeScriptParser;
