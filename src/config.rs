//! Configuration for the indexing engine.
//!
//! `IndexConfig` is validated fail-fast at engine construction. Loading is
//! layered: defaults, then a TOML file, then environment variables.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `LOOM_` and use double underscores to
//! separate nested levels:
//! - `LOOM_MAX_CONCURRENCY=8` sets `max_concurrency`
//! - `LOOM_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{IndexError, IndexResult};

/// Engine configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    /// Absolute path of the workspace to index.
    pub workspace_path: PathBuf,

    /// Dot-prefixed extensions to include.
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,

    /// Glob patterns excluded from discovery (`**`, `*`, `?` dialect).
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Files larger than this many bytes are silently skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Reserved for an external persistence layer; the engine itself never
    /// writes snapshots.
    #[serde(default = "default_true")]
    pub enable_persistence: bool,

    #[serde(default)]
    pub persistence_path: Option<PathBuf>,

    /// Parallelism cap for batch indexing.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration: default level plus per-module overrides.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_include_extensions() -> Vec<String> {
    vec![".ts", ".js", ".tsx", ".jsx"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["node_modules/**", ".git/**", "dist/**"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl IndexConfig {
    /// Create a configuration with defaults for everything but the
    /// workspace path.
    pub fn new(workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace_path: workspace_path.into(),
            include_extensions: default_include_extensions(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
            enable_persistence: true,
            persistence_path: None,
            max_concurrency: default_max_concurrency(),
            logging: LoggingConfig::default(),
        }
    }

    /// Fail-fast validation of every stated invariant.
    pub fn validate(&self) -> IndexResult<()> {
        if self.workspace_path.as_os_str().is_empty() {
            return Err(IndexError::InvalidConfig {
                reason: "workspace_path must be a non-empty path".into(),
            });
        }
        if self.max_file_size == 0 {
            return Err(IndexError::InvalidConfig {
                reason: "max_file_size must be positive".into(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(IndexError::InvalidConfig {
                reason: "max_concurrency must be positive".into(),
            });
        }
        for ext in &self.include_extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(IndexError::InvalidConfig {
                    reason: format!("include extension '{ext}' must start with a dot"),
                });
            }
        }
        for pattern in &self.exclude_patterns {
            if pattern.is_empty() {
                return Err(IndexError::InvalidConfig {
                    reason: "exclude patterns must be non-empty".into(),
                });
            }
        }
        Ok(())
    }

    /// Load configuration layered from a TOML file and `LOOM_` environment
    /// variables over the defaults for the given workspace.
    pub fn load_from(
        workspace_path: impl Into<PathBuf>,
        config_file: impl AsRef<std::path::Path>,
    ) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::new(workspace_path)))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("LOOM_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    /// Save the configuration as pretty TOML.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> IndexResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::General(e.to_string()))?;
        }
        let toml_string =
            toml::to_string_pretty(self).map_err(|e| IndexError::General(e.to_string()))?;
        std::fs::write(path, toml_string).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}
