//! Logging setup for embedding hosts.
//!
//! The crate logs through `tracing`; nothing here is required. A host
//! that already installed its own subscriber keeps it — `init` is a
//! no-op once a global subscriber exists. Level selection comes from
//! `RUST_LOG` when set, otherwise from `LoggingConfig` (a default level
//! plus per-module overrides):
//!
//! ```bash
//! RUST_LOG=codeloom=debug my-tool index
//! RUST_LOG=watcher=trace my-tool watch
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use crate::config::LoggingConfig;

/// UTC wall-clock timestamps with millisecond precision.
struct UtcMillis;

impl FormatTime for UtcMillis {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Utc::now().format("%H:%M:%S%.3fZ"))
    }
}

/// Comma-joined directive string: the default level first, then one
/// `module=level` directive per override.
fn config_directives(config: &LoggingConfig) -> String {
    let mut directives = vec![config.default.clone()];
    directives.extend(
        config
            .modules
            .iter()
            .map(|(module, level)| format!("{module}={level}")),
    );
    directives.join(",")
}

/// `RUST_LOG` wins outright; otherwise the filter is built from the
/// config's directives.
fn level_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config_directives(config)))
}

/// Install the global subscriber from configuration.
///
/// Safe to call more than once; only the first installation (here or
/// anywhere else in the process) takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level_filter(config))
        .with_timer(UtcMillis)
        .try_init();
}

/// Install the global subscriber with the default configuration
/// (`warn`, no module overrides).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info-level event prefixed with its component.
///
/// # Examples
/// ```ignore
/// log_event!("watcher", "started watching {}", root.display());
/// log_event!("engine", "orphan cleanup removed {} files", removed);
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $($arg:tt)+) => {
        tracing::info!("[{}] {}", $component, format!($($arg)+))
    };
}

/// Debug-level counterpart of `log_event!`.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $($arg:tt)+) => {
        tracing::debug!("[{}] {}", $component, format!($($arg)+))
    };
}
