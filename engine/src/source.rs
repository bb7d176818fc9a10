//! Schema-definition source resolution.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::BundleError;

/// Absolute path of the schema-definition module chosen for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinitionSource {
    path: PathBuf,
}

impl SchemaDefinitionSource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Absolute paths of every candidate, in probe order.
pub fn candidate_paths(config: &EngineConfig) -> Vec<PathBuf> {
    config
        .candidates
        .iter()
        .map(|candidate| {
            if candidate.is_absolute() {
                candidate.clone()
            } else {
                config.project_root.join(candidate)
            }
        })
        .collect()
}

/// Picks the first candidate that exists as a regular file.
///
/// # Errors
///
/// Returns [`BundleError::MissingEntry`] listing every path checked when none
/// exists.
pub fn resolve_source(config: &EngineConfig) -> Result<SchemaDefinitionSource, BundleError> {
    let checked = candidate_paths(config);
    for path in &checked {
        if path.is_file() {
            let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            debug!(source = %path.display(), "Resolved schema definition source");
            return Ok(SchemaDefinitionSource { path });
        }
    }
    Err(BundleError::MissingEntry { checked })
}
