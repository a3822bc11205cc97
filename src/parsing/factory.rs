//! Parser construction layer with lazy loaders.
//!
//! A loader is a thunk keyed by extension, language, or name that produces
//! a plugin on first demand. `create_parser` prefers already-registered
//! plugins; a loaded plugin is registered so later lookups hit the
//! registry directly.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ParserError, ParserResult, RegistryError};

use super::language::Language;
use super::parser::ParserPlugin;
use super::registry::{ParserRegistry, RegisterOptions};

/// Thunk producing a plugin on first demand.
pub type ParserLoader = Arc<dyn Fn() -> ParserResult<Arc<dyn ParserPlugin>> + Send + Sync>;

#[derive(Default)]
struct LoaderTables {
    by_extension: HashMap<String, ParserLoader>,
    by_language: HashMap<Language, ParserLoader>,
    by_name: HashMap<String, ParserLoader>,
}

/// Thin construction layer above the registry.
pub struct ParserFactory {
    registry: Arc<ParserRegistry>,
    loaders: RwLock<LoaderTables>,
}

impl ParserFactory {
    pub fn new(registry: Arc<ParserRegistry>) -> Self {
        Self {
            registry,
            loaders: RwLock::new(LoaderTables::default()),
        }
    }

    /// Factory bound to the process-wide registry instance.
    pub fn with_shared_registry() -> Self {
        Self::new(ParserRegistry::instance())
    }

    pub fn register_loader_for_extension(
        &self,
        extension: &str,
        loader: impl Fn() -> ParserResult<Arc<dyn ParserPlugin>> + Send + Sync + 'static,
    ) {
        let key = extension.trim_start_matches('.').to_lowercase();
        self.loaders.write().by_extension.insert(key, Arc::new(loader));
    }

    pub fn register_loader_for_language(
        &self,
        language: Language,
        loader: impl Fn() -> ParserResult<Arc<dyn ParserPlugin>> + Send + Sync + 'static,
    ) {
        self.loaders
            .write()
            .by_language
            .insert(language, Arc::new(loader));
    }

    pub fn register_loader_for_name(
        &self,
        name: &str,
        loader: impl Fn() -> ParserResult<Arc<dyn ParserPlugin>> + Send + Sync + 'static,
    ) {
        self.loaders
            .write()
            .by_name
            .insert(name.to_string(), Arc::new(loader));
    }

    /// Resolve a parser for a file by extension: registered plugin first,
    /// then a matching lazy loader (extension key, then the extension's
    /// language key), else `None`.
    pub fn create_parser(&self, file_path: &Path) -> ParserResult<Option<Arc<dyn ParserPlugin>>> {
        let Some(extension) = file_path.extension().and_then(|ext| ext.to_str()) else {
            return Ok(None);
        };

        if let Some(plugin) = self.registry.get_parser(extension).map_err(registry_error)? {
            return Ok(Some(plugin));
        }

        let loader = {
            let tables = self.loaders.read();
            let key = extension.to_lowercase();
            tables.by_extension.get(&key).cloned().or_else(|| {
                Language::from_extension(extension)
                    .and_then(|language| tables.by_language.get(&language).cloned())
            })
        };

        match loader {
            Some(loader) => self.load_and_register(loader, extension).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve by language: registered plugin first, then a language-keyed
    /// loader.
    pub fn create_parser_by_language(
        &self,
        language: Language,
    ) -> ParserResult<Option<Arc<dyn ParserPlugin>>> {
        if let Some(plugin) = self
            .registry
            .get_parser_by_language(language)
            .map_err(registry_error)?
        {
            return Ok(Some(plugin));
        }
        let loader = self.loaders.read().by_language.get(&language).cloned();
        match loader {
            Some(loader) => {
                let plugin = self.register_loaded(loader()?)?;
                Ok(Some(plugin))
            }
            None => Ok(None),
        }
    }

    /// Resolve by plugin name: registered plugin first, then a name-keyed
    /// loader.
    pub fn create_parser_by_name(
        &self,
        name: &str,
    ) -> ParserResult<Option<Arc<dyn ParserPlugin>>> {
        if let Some(plugin) = self
            .registry
            .get_parser_by_name(name)
            .map_err(registry_error)?
        {
            return Ok(Some(plugin));
        }
        let loader = self.loaders.read().by_name.get(name).cloned();
        match loader {
            Some(loader) => {
                let plugin = self.register_loaded(loader()?)?;
                Ok(Some(plugin))
            }
            None => Ok(None),
        }
    }

    fn load_and_register(
        &self,
        loader: ParserLoader,
        extension: &str,
    ) -> ParserResult<Arc<dyn ParserPlugin>> {
        let plugin = loader()?;
        self.register_loaded(plugin)?;
        // Resolve through the registry so concurrent loads converge on one
        // winner.
        self.registry
            .get_parser(extension)
            .map_err(registry_error)?
            .ok_or_else(|| {
                ParserError::operation(
                    "factory",
                    format!("loaded parser does not cover extension '.{extension}'"),
                )
            })
    }

    fn register_loaded(
        &self,
        plugin: Arc<dyn ParserPlugin>,
    ) -> ParserResult<Arc<dyn ParserPlugin>> {
        match self
            .registry
            .register(Arc::clone(&plugin), RegisterOptions::default())
        {
            Ok(()) => Ok(plugin),
            // Another caller loaded the same plugin first; use theirs.
            Err(RegistryError::DuplicateParser(name)) => self
                .registry
                .get_parser_by_name(&name)
                .map_err(registry_error)?
                .ok_or_else(|| ParserError::operation("factory", "parser vanished during load")),
            Err(err) => Err(registry_error(err)),
        }
    }
}

fn registry_error(err: RegistryError) -> ParserError {
    ParserError::operation("factory", err.to_string())
}
