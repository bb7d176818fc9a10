//! Engine facade.
//!
//! [`SchemaEngine`] owns one [`SchemaCache`] and at most one file watcher.
//! It is the surface collaborators (collection listings, form-schema
//! endpoints, the CLI) program against.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use collection_schema_core::SchemaSet;
use tracing::{info, warn};

use crate::cache::{CacheStatus, SchemaCache};
use crate::config::EngineConfig;
use crate::error::{CompileError, ConfigError};
use crate::pipeline::{CompilePipeline, SchemaCompiler};
use crate::source::candidate_paths;
use crate::watcher::{ConfigWatcher, WatchHandle};

/// Result handed to a reload listener after a watcher-triggered compilation.
pub type ReloadOutcome = Result<Arc<SchemaSet>, CompileError>;

/// Compiled-schema service for one host project.
pub struct SchemaEngine {
    config: EngineConfig,
    cache: Arc<SchemaCache>,
    watcher: Mutex<Option<WatchHandle>>,
}

impl SchemaEngine {
    /// Engine with the production esbuild + node pipeline.
    pub fn new(config: EngineConfig) -> Self {
        let pipeline = SchemaCompiler::from_config(config.clone());
        Self::with_pipeline(config, pipeline)
    }

    /// Engine over a caller-supplied pipeline.
    pub fn with_pipeline(config: EngineConfig, pipeline: impl CompilePipeline + 'static) -> Self {
        Self {
            config,
            cache: Arc::new(SchemaCache::new(pipeline)),
            watcher: Mutex::new(None),
        }
    }

    /// Engine for the project at `root`, reading `.collection-schema.yml` if
    /// present.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self::new(EngineConfig::discover(root)?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Returns every compiled collection, compiling on first use.
    pub fn load_schemas(&self) -> Result<Arc<SchemaSet>, CompileError> {
        self.cache.load()
    }

    /// Drops the cached schema set; the next load recompiles.
    pub fn clear_schema_cache(&self) {
        self.cache.invalidate();
    }

    /// Paths the watcher observes: every source candidate, so creating a
    /// higher-priority file is noticed too.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        candidate_paths(&self.config)
    }

    /// Starts the file watcher once. Returns `false` if it was already
    /// running.
    ///
    /// On a stabilized change the cache is invalidated and reloaded on the
    /// watcher thread.
    pub fn watch_schema_config(&self) -> std::io::Result<bool> {
        self.watch_schema_config_with(|_| {})
    }

    /// Like [`watch_schema_config`](Self::watch_schema_config), also calling
    /// `on_reload` after each watcher-triggered compilation.
    pub fn watch_schema_config_with<F>(&self, on_reload: F) -> std::io::Result<bool>
    where
        F: Fn(&ReloadOutcome) + Send + 'static,
    {
        let mut watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if watcher.as_ref().is_some_and(WatchHandle::is_running) {
            return Ok(false);
        }

        let cache = Arc::clone(&self.cache);
        let handle = ConfigWatcher::new(self.watched_paths(), &self.config.watch).spawn(
            move |changed| {
                info!(
                    changed = ?changed.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                    "Schema definition changed, recompiling"
                );
                cache.invalidate();
                let outcome = cache.load();
                match &outcome {
                    Ok(set) => info!(collections = set.len(), "Recompiled collection schemas"),
                    Err(e) => warn!(error = %e, "Recompilation failed"),
                }
                on_reload(&outcome);
            },
        )?;
        *watcher = Some(handle);
        Ok(true)
    }

    /// Stops the watcher. Returns `false` if none was running.
    pub fn stop_watching(&self) -> bool {
        let handle = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(WatchHandle::is_running)
    }
}

impl std::fmt::Debug for SchemaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEngine")
            .field("project_root", &self.config.project_root)
            .field("cache", &self.cache)
            .field("watching", &self.is_watching())
            .finish()
    }
}
