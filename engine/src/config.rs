//! Engine configuration.
//!
//! Every field has a default, so an absent or partial
//! `.collection-schema.yml` in the project root is valid.
//!
//! # Example YAML
//!
//! ```yaml
//! candidates:
//!   - src/content.config.ts
//!   - src/content/config.ts
//! virtual_module: "astro:content"
//! validation_library: zod
//! externals:
//!   - sharp
//! node_binary: node
//! bundle_timeout_ms: 30000
//! load_timeout_ms: 30000
//! watch:
//!   poll_interval_ms: 250
//!   debounce_ms: 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name looked up in the project root by [`EngineConfig::discover`].
pub const CONFIG_FILE_NAME: &str = ".collection-schema.yml";

/// Schema-definition files probed in order, relative to the project root.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "src/content.config.ts",
    "src/content.config.mts",
    "src/content.config.js",
    "src/content.config.mjs",
    "src/content/config.ts",
    "src/content/config.mts",
    "src/content/config.js",
    "src/content/config.mjs",
];

/// Module specifier the host framework resolves to its content API.
pub const DEFAULT_VIRTUAL_MODULE: &str = "astro:content";

/// Validation library left external so it binds to the host's copy.
pub const DEFAULT_VALIDATION_LIBRARY: &str = "zod";

const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

/// File-watcher timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// How often watched files are fingerprinted.
    pub poll_interval_ms: u64,
    /// How long fingerprints must stay unchanged before a change is reported.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            debounce_ms: 300,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Settings for one host project.
///
/// # Examples
///
/// ```
/// use collection_schema_engine::config::EngineConfig;
///
/// let config = EngineConfig::for_project("/srv/site");
/// assert_eq!(config.virtual_module, "astro:content");
/// assert_eq!(config.staging_dir(), std::path::Path::new("/srv/site"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the host project. Not read from the config file.
    #[serde(skip)]
    pub project_root: PathBuf,
    /// Schema-definition files to probe, relative to `project_root`.
    pub candidates: Vec<PathBuf>,
    /// Import specifier replaced by the content shim.
    pub virtual_module: String,
    /// Validation library re-exported by the shim and kept external.
    pub validation_library: String,
    /// Additional bare specifiers to keep external.
    pub externals: Vec<String>,
    /// JavaScript runtime used to drive the bundler and load modules.
    pub node_binary: PathBuf,
    /// Directory for staged modules; defaults to `project_root`.
    pub staging_dir: Option<PathBuf>,
    pub bundle_timeout_ms: u64,
    pub load_timeout_ms: u64,
    pub watch: WatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            candidates: DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
            virtual_module: DEFAULT_VIRTUAL_MODULE.to_string(),
            validation_library: DEFAULT_VALIDATION_LIBRARY.to_string(),
            externals: Vec::new(),
            node_binary: PathBuf::from("node"),
            staging_dir: None,
            bundle_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
            load_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
            watch: WatchConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `root`.
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file and roots it at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>, root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.project_root = root.into();
        Ok(config)
    }

    /// Loads `<root>/.collection-schema.yml` when present, defaults otherwise.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path, root)
        } else {
            Ok(Self::for_project(root))
        }
    }

    /// Parses configuration from YAML text. `project_root` stays at its default.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Directory in which bundled modules are staged for import.
    pub fn staging_dir(&self) -> PathBuf {
        match &self.staging_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.clone(),
        }
    }

    /// Bare specifiers the bundler must not inline.
    pub fn external_specifiers(&self) -> Vec<String> {
        let mut externals = vec![
            self.validation_library.clone(),
            format!("{}/*", self.validation_library),
        ];
        for extra in &self.externals {
            if !externals.contains(extra) {
                externals.push(extra.clone());
            }
        }
        externals
    }

    pub fn bundle_timeout(&self) -> Duration {
        Duration::from_millis(self.bundle_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}
