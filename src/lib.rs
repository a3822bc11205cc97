//! codeloom: the code intelligence core.
//!
//! An incremental indexing engine that scans a workspace, extracts symbols
//! and cross-file dependencies through pluggable language parsers, keeps
//! query-optimized in-memory indexes consistent under file-watch-driven
//! updates, and exposes symbol/file/dependency lookups to higher layers
//! (CLIs, tool servers, refactoring engines).
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use codeloom::config::IndexConfig;
//! use codeloom::indexing::IndexEngine;
//! use codeloom::parsing::{ParserRegistry, RegisterOptions, TypeScriptParser};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ParserRegistry::instance();
//! registry.register(Arc::new(TypeScriptParser::new()?), RegisterOptions::default())?;
//! registry.initialize()?;
//!
//! let engine = IndexEngine::new(IndexConfig::new("/path/to/workspace"))?;
//! engine.index_project(None).await?;
//!
//! for hit in engine.find_symbol("Calculator", None)? {
//!     println!("{} ({})", hit.symbol.name, hit.symbol.kind);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod indexing;
pub mod logging;
pub mod parsing;
pub mod types;
pub mod watcher;

pub use cache::{CacheManager, CacheOptions, EvictionPolicy, MemoryCache};
pub use config::IndexConfig;
pub use error::{CacheError, IndexError, IndexResult, ParserError, RegistryError};
pub use indexing::{
    FileIndex, FileInfo, IndexEngine, IndexOutcome, IndexStats, SearchOptions, SymbolIndex,
    SymbolSearchResult,
};
pub use parsing::{
    Ast, JavaScriptParser, Language, ParserCapabilities, ParserFactory, ParserPlugin,
    ParserRegistry, RegisterOptions, TypeScriptParser,
};
pub use types::{
    CodeEdit, Definition, Dependency, DependencyKind, Location, Position, Range, Reference, Scope,
    ScopeKind, ScopeSegment, Symbol, SymbolKind, Usage, UsageKind,
};
pub use watcher::{ChangeKind, FileWatcher, WatchError, WatcherOptions};
