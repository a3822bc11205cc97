//! Error types for the code intelligence core.
//!
//! Each subsystem raises its own thiserror enum; higher layers translate
//! them to exit codes or transport envelopes. Errors carry a readable
//! message and, where applicable, the offending path. No stack traces.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for engine and index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Construction-time configuration violation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("index path must be a valid string")]
    InvalidIndexPath,

    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    #[error("index path must be a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No parser registered for the file's extension.
    #[error("no parser found for {path}")]
    NoParser { path: PathBuf },

    /// A parser raised while parsing or extracting. The file's parse
    /// errors are populated before this surfaces.
    #[error("parsing failed for {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("indexing failed for {path}: {reason}")]
    IndexingFailed { path: PathBuf, reason: String },

    /// Mutating setter called for a path never added to the file index.
    #[error("file not in index: {path}")]
    FileNotInIndex { path: PathBuf },

    #[error("{component} has been disposed")]
    Disposed { component: &'static str },

    #[error("{0}")]
    General(String),
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised by the parser registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("parser '{0}' is already registered")]
    DuplicateParser(String),

    #[error("parser '{0}' is not registered")]
    ParserNotFound(String),

    /// A plugin failed its `validate()` self-check during registry
    /// initialization. The underlying reasons are joined into `reason`.
    #[error("parser '{name}' failed to initialize: {reason}")]
    Initialization { name: String, reason: String },

    /// The plugin object does not honor the plugin contract.
    #[error("parser '{name}' violates the plugin contract: {reason}")]
    InvalidPlugin { name: String, reason: String },

    #[error("parser registry has been disposed")]
    Disposed,
}

/// Errors raised by parser plugin operations.
#[derive(Error, Debug, Clone)]
pub enum ParserError {
    /// Parse failure with the offending source location.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
        syntax_element: Option<String>,
    },

    /// Failure of any non-parse operation.
    #[error("{code}: {message}")]
    Operation {
        code: &'static str,
        message: String,
        line: Option<u32>,
        column: Option<u32>,
    },

    #[error("operation not supported by this parser: {operation}")]
    Unsupported { operation: &'static str },
}

impl ParserError {
    pub fn operation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            code,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn operation_at(
        code: &'static str,
        message: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self::Operation {
            code,
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

/// Result type alias for parser operations.
pub type ParserResult<T> = Result<T, ParserError>;

/// Errors raised by the cache manager.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache '{0}' already exists")]
    DuplicateCache(String),

    #[error("cache '{0}' not found")]
    CacheNotFound(String),

    #[error("cache manager has been disposed")]
    Disposed,
}

/// Result type alias for cache-manager operations.
pub type CacheResult<T> = Result<T, CacheError>;
