//! Process-wide parser registry.
//!
//! One registry is shared across engine instances because parsers carry
//! non-trivial initialization cost (grammars, token tables). Registration
//! and unregistration are infrequent configuration events and run
//! exclusively; lookups are read-mostly and run concurrently.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock};

use crate::error::RegistryError;

use super::language::Language;
use super::parser::{ParserPlugin, ValidationResult, check_plugin_contract};

/// A registered plugin with its dispatch metadata.
#[derive(Clone)]
pub struct ParserInfo {
    pub plugin: Arc<dyn ParserPlugin>,
    pub priority: i32,
    /// Registration order, used to break priority ties.
    seq: u64,
}

/// Options for `ParserRegistry::register`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    pub priority: i32,
    /// Replace an existing plugin with the same name instead of failing.
    /// The registry does not call the replaced plugin's `dispose()`.
    pub override_existing: bool,
}

#[derive(Default)]
struct RegistryState {
    parsers: HashMap<String, ParserInfo>,
    by_extension: HashMap<String, Vec<ParserInfo>>,
    by_language: HashMap<Language, Vec<ParserInfo>>,
    next_seq: u64,
    initialized: bool,
    disposed: bool,
}

impl RegistryState {
    fn remove_entry(&mut self, name: &str) -> Option<ParserInfo> {
        let info = self.parsers.remove(name)?;
        for ext in info.plugin.supported_extensions() {
            let key = normalize_extension(ext);
            if let Some(bucket) = self.by_extension.get_mut(&key) {
                bucket.retain(|entry| entry.seq != info.seq);
                if bucket.is_empty() {
                    self.by_extension.remove(&key);
                }
            }
        }
        for language in info.plugin.supported_languages() {
            if let Some(bucket) = self.by_language.get_mut(language) {
                bucket.retain(|entry| entry.seq != info.seq);
                if bucket.is_empty() {
                    self.by_language.remove(language);
                }
            }
        }
        Some(info)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn sort_bucket(bucket: &mut [ParserInfo]) {
    bucket.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
}

static INSTANCE: LazyLock<RwLock<Arc<ParserRegistry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ParserRegistry::new())));

/// Registry keyed by plugin name, with extension and language secondary
/// tables sorted by descending priority.
pub struct ParserRegistry {
    state: RwLock<RegistryState>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// The process-wide shared instance.
    pub fn instance() -> Arc<ParserRegistry> {
        INSTANCE.read().clone()
    }

    /// Replace the singleton with a fresh registry. Exists solely for
    /// testability; returns the new instance.
    pub fn reset_instance() -> Arc<ParserRegistry> {
        let fresh = Arc::new(ParserRegistry::new());
        *INSTANCE.write() = Arc::clone(&fresh);
        fresh
    }

    /// Register a plugin. Fails on contract violations and, unless
    /// `override_existing` is set, on duplicate names.
    pub fn register(
        &self,
        plugin: Arc<dyn ParserPlugin>,
        options: RegisterOptions,
    ) -> Result<(), RegistryError> {
        let name = plugin.name().to_string();
        check_plugin_contract(plugin.as_ref()).map_err(|reason| RegistryError::InvalidPlugin {
            name: name.clone(),
            reason,
        })?;

        let mut state = self.state.write();
        if state.disposed {
            return Err(RegistryError::Disposed);
        }
        if state.parsers.contains_key(&name) {
            if !options.override_existing {
                return Err(RegistryError::DuplicateParser(name));
            }
            state.remove_entry(&name);
        }

        let info = ParserInfo {
            plugin: Arc::clone(&plugin),
            priority: options.priority,
            seq: state.next_seq,
        };
        state.next_seq += 1;
        state.parsers.insert(name, info.clone());

        for ext in plugin.supported_extensions() {
            let bucket = state
                .by_extension
                .entry(normalize_extension(ext))
                .or_default();
            bucket.push(info.clone());
            sort_bucket(bucket);
        }
        for language in plugin.supported_languages() {
            let bucket = state.by_language.entry(*language).or_default();
            bucket.push(info.clone());
            sort_bucket(bucket);
        }
        Ok(())
    }

    /// Unregister a plugin by name, removing it from every bucket and
    /// deleting buckets that become empty.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        if state.disposed {
            return Err(RegistryError::Disposed);
        }
        state
            .remove_entry(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::ParserNotFound(name.to_string()))
    }

    /// Highest-priority plugin for an extension (with or without dot), or
    /// `None` when nothing covers it. Fails with `Disposed` on a disposed
    /// registry so callers can tell the two apart.
    pub fn get_parser(
        &self,
        extension: &str,
    ) -> Result<Option<Arc<dyn ParserPlugin>>, RegistryError> {
        let state = self.state.read();
        if state.disposed {
            return Err(RegistryError::Disposed);
        }
        Ok(state
            .by_extension
            .get(&normalize_extension(extension))
            .and_then(|bucket| bucket.first())
            .map(|info| Arc::clone(&info.plugin)))
    }

    /// Highest-priority plugin for a language, or `None`. Fails with
    /// `Disposed` on a disposed registry.
    pub fn get_parser_by_language(
        &self,
        language: Language,
    ) -> Result<Option<Arc<dyn ParserPlugin>>, RegistryError> {
        let state = self.state.read();
        if state.disposed {
            return Err(RegistryError::Disposed);
        }
        Ok(state
            .by_language
            .get(&language)
            .and_then(|bucket| bucket.first())
            .map(|info| Arc::clone(&info.plugin)))
    }

    /// Plugin registered under a name, or `None`. Fails with `Disposed`
    /// on a disposed registry.
    pub fn get_parser_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn ParserPlugin>>, RegistryError> {
        let state = self.state.read();
        if state.disposed {
            return Err(RegistryError::Disposed);
        }
        Ok(state
            .parsers
            .get(name)
            .map(|info| Arc::clone(&info.plugin)))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.read().parsers.contains_key(name)
    }

    pub fn parser_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().parsers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn parser_count(&self) -> usize {
        self.state.read().parsers.len()
    }

    /// Run every plugin's `validate()` self-check concurrently.
    ///
    /// The first failure surfaces as `Initialization` with the underlying
    /// reasons joined. Idempotent after the first success.
    pub fn initialize(&self) -> Result<(), RegistryError> {
        let snapshot: Vec<(String, Arc<dyn ParserPlugin>)> = {
            let state = self.state.read();
            if state.disposed {
                return Err(RegistryError::Disposed);
            }
            if state.initialized {
                return Ok(());
            }
            state
                .parsers
                .values()
                .map(|info| (info.plugin.name().to_string(), Arc::clone(&info.plugin)))
                .collect()
        };

        let results: Vec<(String, ValidationResult)> = std::thread::scope(|scope| {
            let handles: Vec<_> = snapshot
                .iter()
                .map(|(_, plugin)| {
                    let plugin = Arc::clone(plugin);
                    scope.spawn(move || plugin.validate())
                })
                .collect();
            handles
                .into_iter()
                .zip(snapshot.iter())
                .map(|(handle, (name, _))| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| ValidationResult::invalid("validate() panicked"));
                    (name.clone(), result)
                })
                .collect()
        });

        for (name, result) in results {
            for warning in &result.warnings {
                tracing::warn!("[registry] parser '{name}': {warning}");
            }
            if !result.valid {
                return Err(RegistryError::Initialization {
                    name,
                    reason: result.errors.join("; "),
                });
            }
        }

        self.state.write().initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Dispose every plugin concurrently and transition to the terminal
    /// disposed state. Individual dispose failures are logged, never
    /// propagated. A second call is a no-op.
    pub fn dispose(&self) {
        let plugins: Vec<(String, Arc<dyn ParserPlugin>)> = {
            let mut state = self.state.write();
            if state.disposed {
                return;
            }
            state.disposed = true;
            let plugins = state
                .parsers
                .values()
                .map(|info| (info.plugin.name().to_string(), Arc::clone(&info.plugin)))
                .collect();
            state.parsers.clear();
            state.by_extension.clear();
            state.by_language.clear();
            plugins
        };

        std::thread::scope(|scope| {
            for (name, plugin) in &plugins {
                scope.spawn(move || {
                    let outcome =
                        std::panic::catch_unwind(AssertUnwindSafe(|| plugin.dispose()));
                    if outcome.is_err() {
                        tracing::warn!("[registry] parser '{name}' failed to dispose cleanly");
                    }
                });
            }
        });
    }

    pub fn is_disposed(&self) -> bool {
        self.state.read().disposed
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
