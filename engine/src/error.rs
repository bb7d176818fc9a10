//! Error types for schema compilation.
//!
//! [`BundleError`], [`ConfigShapeError`] and [`LoadError`] abort a load and
//! reach the caller through [`CompileError`]. [`SchemaConversionError`] never
//! leaves the walker: it is recovered with a fallback schema and recorded as a
//! warning.
//!
//! Every type here is `Clone` so a single failed compilation can be handed to
//! every caller that was waiting on it.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The schema-definition module could not be turned into a single bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// None of the candidate source files exist.
    #[error(
        "no schema definition file found; checked:\n{}",
        format_checked(.checked)
    )]
    MissingEntry { checked: Vec<PathBuf> },

    /// The entry file exists but cannot be read.
    #[error("cannot read {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    /// The module (or one of its local imports) failed to parse.
    #[error("syntax error{}: {message}", format_location(.location))]
    Syntax {
        message: String,
        location: Option<String>,
    },

    /// An import other than the host virtual module could not be resolved.
    #[error("could not resolve import \"{specifier}\"{}", format_importer(.importer))]
    UnresolvedImport {
        specifier: String,
        importer: Option<String>,
    },

    /// The bundler itself failed (not installed, timed out, bad reply).
    #[error("bundler failed: {0}")]
    Tool(String),
}

/// The module loaded but does not export a usable `collections` object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema module: {message}")]
pub struct ConfigShapeError {
    pub message: String,
}

impl ConfigShapeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The module has no `collections` export at all.
    pub fn missing_collections() -> Self {
        Self::new("the schema module must export a `collections` object")
    }
}

/// The bundled module could not be staged or executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The staged module file could not be written.
    #[error("failed to stage bundled module in {}: {message}", .dir.display())]
    Staging { dir: PathBuf, message: String },

    /// User code threw while the module was being imported.
    #[error("schema module threw during import: {message}")]
    Runtime {
        message: String,
        stack: Option<String>,
    },

    /// The runtime itself failed (not installed, timed out, bad reply).
    #[error("module runtime failed: {0}")]
    Tool(String),
}

/// A single schema node could not be converted to JSON Schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaConversionError {
    #[error("{kind} nodes have no JSON Schema representation")]
    Unsupported { kind: String },
    #[error("invalid {kind} node: {message}")]
    Invalid { kind: String, message: String },
}

/// Failure of one full compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    ConfigShape(#[from] ConfigShapeError),
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The pipeline panicked before producing a result.
    #[error("schema compilation aborted before completing")]
    Aborted,
}

/// Configuration file could not be read or parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

fn format_checked(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_location(location: &Option<String>) -> String {
    location
        .as_deref()
        .map(|l| format!(" at {l}"))
        .unwrap_or_default()
}

fn format_importer(importer: &Option<String>) -> String {
    importer
        .as_deref()
        .map(|i| format!(" from {i}"))
        .unwrap_or_default()
}

impl BundleError {
    pub(crate) fn unreadable(path: &Path, err: &std::io::Error) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
