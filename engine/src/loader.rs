//! Dynamic loader.
//!
//! Stages a [`BundledModule`] as a uniquely named file inside the host
//! project's module-resolution scope, imports it through a
//! [`ModuleRuntime`], and reads its `collections` export. The staged file is
//! removed on every exit path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use collection_schema_core::{CollectionDeclaration, CollectionType, SchemaNode};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::bundler::BundledModule;
use crate::config::EngineConfig;
use crate::error::{CompileError, ConfigShapeError, LoadError};
use crate::process::{ScriptRun, run_script};

const INTROSPECT_SCRIPT: &str = include_str!("js/introspect.mjs");

/// File-name prefix of staged modules.
pub const STAGED_PREFIX: &str = ".collection-schema-";

/// File-name suffix of staged modules.
pub const STAGED_SUFFIX: &str = ".mjs";

/// Nesting depth past which the runtime reports schema nodes as `other`.
///
/// An object level is two JSON levels in the reply (node plus shape map), so
/// this keeps replies inside `serde_json`'s recursion limit of 128.
pub const INTROSPECT_MAX_DEPTH: usize = 40;

/// One entry of a module's `collections` export, as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportedCollection {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub schema: Option<SchemaNode>,
}

/// The parts of a module's exports the engine reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleExports {
    /// `None` when the module has no usable `collections` export.
    #[serde(default)]
    pub collections: Option<Vec<ExportedCollection>>,
    /// Why `collections` is unusable, when the runtime could tell.
    #[serde(default)]
    pub shape_issue: Option<String>,
}

/// Dynamic-import primitive: executes a module file and reports its exports.
pub trait ModuleRuntime: Send + Sync {
    fn import_module(&self, module: &Path) -> Result<ModuleExports, LoadError>;
}

/// [`ModuleRuntime`] that imports modules with node.
#[derive(Debug, Clone)]
pub struct NodeRuntime {
    node_binary: PathBuf,
    project_root: PathBuf,
    timeout: Duration,
}

impl NodeRuntime {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            node_binary: config.node_binary.clone(),
            project_root: config.project_root.clone(),
            timeout: config.load_timeout(),
        }
    }
}

impl ModuleRuntime for NodeRuntime {
    fn import_module(&self, module: &Path) -> Result<ModuleExports, LoadError> {
        let request = serde_json::json!({
            "module": module.to_string_lossy(),
            "maxDepth": INTROSPECT_MAX_DEPTH,
        });
        let output = run_script(&ScriptRun {
            node_binary: &self.node_binary,
            script: INTROSPECT_SCRIPT,
            request: &request,
            cwd: &self.project_root,
            timeout: self.timeout,
        })
        .map_err(|failure| LoadError::Tool(failure.to_string()))?;

        match output.reply() {
            Some(reply) => parse_introspect_reply(reply),
            None => Err(LoadError::Tool(format!(
                "introspection script exited with {} and no reply: {}",
                output.status,
                output.stderr_tail()
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectReply {
    ok: bool,
    #[serde(default)]
    exports: Option<ModuleExports>,
    #[serde(default)]
    error: Option<RuntimeErrorReply>,
}

#[derive(Debug, Deserialize)]
struct RuntimeErrorReply {
    message: String,
    #[serde(default)]
    stack: Option<String>,
}

/// Parses the introspection script's reply.
pub fn parse_introspect_reply(reply: &str) -> Result<ModuleExports, LoadError> {
    let reply: IntrospectReply = serde_json::from_str(reply)
        .map_err(|e| LoadError::Tool(format!("malformed introspection reply: {e}")))?;
    if reply.ok {
        return Ok(reply.exports.unwrap_or_default());
    }
    let error = reply.error.unwrap_or(RuntimeErrorReply {
        message: "unknown error".to_string(),
        stack: None,
    });
    Err(LoadError::Runtime {
        message: error.message,
        stack: error.stack,
    })
}

/// Stages bundles and imports them through a [`ModuleRuntime`].
pub struct DynamicLoader<R> {
    staging_dir: PathBuf,
    runtime: R,
}

impl<R: ModuleRuntime> DynamicLoader<R> {
    pub fn new(staging_dir: impl Into<PathBuf>, runtime: R) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            runtime,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Imports `bundle` and returns its declared collections in order.
    ///
    /// # Errors
    ///
    /// [`CompileError::Load`] when the module cannot be staged or throws
    /// while importing; [`CompileError::ConfigShape`] when it has no usable
    /// `collections` export.
    pub fn load(
        &self,
        bundle: &BundledModule,
    ) -> Result<IndexMap<String, CollectionDeclaration>, CompileError> {
        let staged = self.stage(bundle)?;
        debug!(staged = %staged.path().display(), "Staged bundled module");

        // `staged` deletes its file when dropped, so early returns clean up.
        let exports = self.runtime.import_module(staged.path())?;

        if let Err(e) = staged.close() {
            warn!(error = %e, "Failed to remove staged module");
        }

        declarations_from_exports(exports)
    }

    fn stage(&self, bundle: &BundledModule) -> Result<tempfile::NamedTempFile, LoadError> {
        let staging_err = |e: std::io::Error| LoadError::Staging {
            dir: self.staging_dir.clone(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(&self.staging_dir).map_err(staging_err)?;
        let mut file = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(STAGED_SUFFIX)
            .tempfile_in(&self.staging_dir)
            .map_err(staging_err)?;
        file.write_all(bundle.code.as_bytes()).map_err(staging_err)?;
        file.flush().map_err(staging_err)?;
        Ok(file)
    }
}

/// Converts runtime exports into ordered declarations.
pub fn declarations_from_exports(
    exports: ModuleExports,
) -> Result<IndexMap<String, CollectionDeclaration>, CompileError> {
    let Some(collections) = exports.collections else {
        let err = match exports.shape_issue {
            Some(issue) => ConfigShapeError::new(format!(
                "{issue}; the schema module must export a `collections` object"
            )),
            None => ConfigShapeError::missing_collections(),
        };
        return Err(err.into());
    };

    let mut declarations = IndexMap::with_capacity(collections.len());
    for exported in collections {
        if declarations.contains_key(&exported.name) {
            return Err(ConfigShapeError::new(format!(
                "collection `{}` is declared more than once",
                exported.name
            ))
            .into());
        }
        let kind = match exported.kind.as_deref() {
            None => CollectionType::default(),
            Some(raw) => CollectionType::parse(raw).unwrap_or_else(|| {
                debug!(collection = %exported.name, kind = raw, "Unknown collection type, using content");
                CollectionType::default()
            }),
        };
        declarations.insert(
            exported.name.clone(),
            CollectionDeclaration {
                name: exported.name,
                kind,
                raw_schema: exported.schema,
            },
        );
    }
    Ok(declarations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Runtime that records whether the staged file existed during import.
    struct RecordingRuntime {
        result: Result<ModuleExports, LoadError>,
        seen: Mutex<Vec<(PathBuf, bool, String)>>,
    }

    impl RecordingRuntime {
        fn returning(result: Result<ModuleExports, LoadError>) -> Self {
            Self {
                result,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ModuleRuntime for RecordingRuntime {
        fn import_module(&self, module: &Path) -> Result<ModuleExports, LoadError> {
            let content = std::fs::read_to_string(module).unwrap_or_default();
            self.seen
                .lock()
                .unwrap()
                .push((module.to_path_buf(), module.exists(), content));
            self.result.clone()
        }
    }

    fn bundle() -> BundledModule {
        BundledModule {
            code: "export const collections = {};".into(),
            entry: PathBuf::from("/site/src/content/config.ts"),
        }
    }

    fn staged_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(STAGED_PREFIX))
            .collect()
    }

    fn exports_with(names: &[(&str, Option<&str>)]) -> ModuleExports {
        ModuleExports {
            collections: Some(
                names
                    .iter()
                    .map(|(name, kind)| ExportedCollection {
                        name: name.to_string(),
                        kind: kind.map(String::from),
                        schema: Some(SchemaNode::object([("title", SchemaNode::string())])),
                    })
                    .collect(),
            ),
            shape_issue: None,
        }
    }

    #[test]
    fn test_successful_load_removes_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DynamicLoader::new(
            dir.path(),
            RecordingRuntime::returning(Ok(exports_with(&[("blog", Some("content"))]))),
        );

        let declarations = loader.load(&bundle()).unwrap();
        assert_eq!(declarations.len(), 1);

        let seen = loader.runtime.seen.lock().unwrap();
        let (path, existed, content) = &seen[0];
        assert!(existed, "staged file must exist while importing");
        assert_eq!(content, "export const collections = {};");
        assert!(path.starts_with(dir.path()));
        assert!(path.extension().is_some_and(|ext| ext == "mjs"));
        assert!(!path.exists());
        assert!(staged_files(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_load_removes_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DynamicLoader::new(
            dir.path(),
            RecordingRuntime::returning(Err(LoadError::Runtime {
                message: "boom".into(),
                stack: None,
            })),
        );

        let err = loader.load(&bundle()).unwrap_err();
        assert!(matches!(err, CompileError::Load(LoadError::Runtime { .. })));
        assert!(staged_files(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_collections_export_is_config_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DynamicLoader::new(
            dir.path(),
            RecordingRuntime::returning(Ok(ModuleExports::default())),
        );

        let err = loader.load(&bundle()).unwrap_err();
        assert!(matches!(err, CompileError::ConfigShape(_)));
        assert!(err.to_string().contains("`collections`"));
        assert!(staged_files(dir.path()).is_empty());
    }

    #[test]
    fn test_staging_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("node_modules/.cache/collection-schema");
        let loader = DynamicLoader::new(
            &nested,
            RecordingRuntime::returning(Ok(exports_with(&[]))),
        );
        loader.load(&bundle()).unwrap();
        assert!(nested.is_dir());
        assert!(staged_files(&nested).is_empty());
    }

    #[test]
    fn test_declaration_order_and_types() {
        let declarations = declarations_from_exports(exports_with(&[
            ("posts", Some("content")),
            ("authors", Some("data")),
            ("docs", Some("content_layer")),
            ("misc", None),
        ]))
        .unwrap();

        let names: Vec<&str> = declarations.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["posts", "authors", "docs", "misc"]);
        assert_eq!(declarations["authors"].kind, CollectionType::Data);
        assert_eq!(declarations["docs"].kind, CollectionType::Content);
        assert_eq!(declarations["misc"].kind, CollectionType::Content);
    }

    #[test]
    fn test_duplicate_collection_name_rejected() {
        let err = declarations_from_exports(exports_with(&[("a", None), ("a", None)])).unwrap_err();
        assert!(matches!(err, CompileError::ConfigShape(_)));
    }

    #[test]
    fn test_shape_issue_is_reported() {
        let err = declarations_from_exports(ModuleExports {
            collections: None,
            shape_issue: Some("`collections` export is a function, expected an object".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("is a function"));
    }

    #[test]
    fn test_parse_introspect_reply() {
        let exports = parse_introspect_reply(
            r#"{"ok":true,"exports":{"collections":[{"name":"blog","type":"content","schema":{"kind":"object","shape":{}}}],"shapeIssue":null}}"#,
        )
        .unwrap();
        let collections = exports.collections.unwrap();
        assert_eq!(collections[0].name, "blog");
        assert_eq!(collections[0].schema, Some(SchemaNode::object::<&str, _>([])));

        let err = parse_introspect_reply(
            r#"{"ok":false,"error":{"message":"z is not defined","stack":"ReferenceError: z is not defined"}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            LoadError::Runtime {
                message: "z is not defined".into(),
                stack: Some("ReferenceError: z is not defined".into()),
            }
        );
    }

    #[test]
    fn test_deepest_introspect_reply_parses() {
        // Objects down to the depth cap, then the runtime's cut-off marker.
        let mut node = serde_json::json!({ "kind": "other", "type_name": "max_depth" });
        for _ in 0..=INTROSPECT_MAX_DEPTH {
            node = serde_json::json!({ "kind": "object", "shape": { "nested": node } });
        }
        let reply = serde_json::json!({
            "ok": true,
            "exports": {
                "collections": [{ "name": "deep", "type": "data", "schema": node }],
                "shapeIssue": null,
            },
        });

        let exports = parse_introspect_reply(&reply.to_string()).unwrap();
        let collections = exports.collections.unwrap();
        let mut node = collections[0].schema.as_ref().unwrap();
        let mut levels = 0;
        while let SchemaNode::Object { shape } = node {
            node = &shape["nested"];
            levels += 1;
        }
        assert_eq!(levels, INTROSPECT_MAX_DEPTH + 1);
        assert_eq!(
            node,
            &SchemaNode::Other {
                type_name: "max_depth".into()
            }
        );
    }
}
