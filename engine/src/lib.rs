//! Schema compilation and introspection for content collections.
//!
//! Takes a user-authored schema-definition module (code, not data), bundles
//! it against a minimal shim of the host framework's content API, imports the
//! bundle in the host project's runtime, and turns each declared collection's
//! validation schema into a JSON-Schema document plus a catalog of its
//! discriminated unions ("block types").
//!
//! # Pipeline
//!
//! 1. [`source::resolve_source`]: first existing candidate file wins.
//! 2. [`bundler::Bundler`]: one ESM text with the virtual module shimmed and
//!    the validation library left external.
//! 3. [`loader::DynamicLoader`]: stage, import, read `collections`, clean up.
//! 4. [`walker::SchemaWalker`]: JSON Schema and unions per collection.
//! 5. [`cache::SchemaCache`]: single-flight cache over 1–4.
//!
//! [`SchemaEngine`] ties these together and owns the file watcher
//! ([`watcher::ConfigWatcher`]).
//!
//! # Example
//!
//! ```no_run
//! use collection_schema_engine::{SchemaEngine, enrich_schema_with_block_types};
//!
//! let engine = SchemaEngine::discover("/srv/site").unwrap();
//! let schemas = engine.load_schemas().unwrap();
//! for (name, collection) in schemas.iter() {
//!     let form = enrich_schema_with_block_types(
//!         &collection.schema,
//!         &collection.discriminated_unions,
//!     );
//!     println!("{name}: {form}");
//! }
//! engine.watch_schema_config().unwrap();
//! ```
//!
//! Running the production pipeline requires `node` and the host project's
//! `esbuild` and validation library to be installed.

pub mod bundler;
pub mod cache;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod shim;
pub mod source;
pub mod walker;
pub mod watcher;

pub use cache::{CacheStats, CacheStatus, SchemaCache};
pub use collection_schema_core::enrich_schema_with_block_types;
pub use config::EngineConfig;
pub use engine::SchemaEngine;
pub use error::{
    BundleError, CompileError, ConfigError, ConfigShapeError, LoadError, SchemaConversionError,
};
pub use pipeline::{CompilePipeline, SchemaCompiler};
pub use watcher::{ConfigWatcher, WatchHandle};
