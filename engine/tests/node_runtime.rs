//! Runs the embedded helper scripts under a real `node`.
//!
//! Schema modules here are built from objects shaped like the validation
//! library's (`{ _def: { typeName, ... } }`), so no npm packages are needed.
//! Every test returns early when `node` is not on `PATH`.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use collection_schema_core::{CollectionType, PathSegment, display_path};
use collection_schema_engine::bundler::{BundledModule, Bundler, EsbuildBundler};
use collection_schema_engine::converter::DraftConverter;
use collection_schema_engine::loader::{DynamicLoader, NodeRuntime, STAGED_PREFIX};
use collection_schema_engine::walker::SchemaWalker;
use collection_schema_engine::{BundleError, CompileError, EngineConfig, LoadError};
use serde_json::json;

const STUBS: &str = r#"
const def = (typeName, extra = {}) => ({ _def: { typeName, ...extra } });
const literal = (value) => def("ZodLiteral", { value });
const string = (checks = []) => def("ZodString", { checks });
const object = (shape) => def("ZodObject", { shape: () => shape });
const block = (type, fields) => object({ type: literal(type), ...fields });
"#;

const SITE_MODULE: &str = r#"
export const collections = {
  pages: {
    type: "content",
    schema: ({ image }) => object({
      title: string([{ kind: "min", value: 1 }]),
      cover: def("ZodOptional", { innerType: image() }),
      slug: def("ZodEffects", { schema: string() }),
      blocks: def("ZodArray", {
        type: def("ZodDiscriminatedUnion", {
          discriminator: "type",
          options: [
            block("heroBlock", { heading: string() }),
            object({ type: string(), body: string() }),
            block("cta", { href: string([{ kind: "url" }]) }),
          ],
        }),
      }),
    }),
  },
  authors: {
    type: "data",
    schema: object({ name: def("ZodBranded", { type: string() }) }),
  },
};
"#;

fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn project() -> (tempfile::TempDir, EngineConfig) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::for_project(dir.path());
    config.load_timeout_ms = 10_000;
    config.bundle_timeout_ms = 10_000;
    (dir, config)
}

fn loader(config: &EngineConfig) -> DynamicLoader<NodeRuntime> {
    DynamicLoader::new(&config.project_root, NodeRuntime::new(config))
}

fn module(code: &str) -> BundledModule {
    BundledModule {
        code: format!("{STUBS}\n{code}"),
        entry: "src/content/config.ts".into(),
    }
}

fn staged_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(STAGED_PREFIX))
        .collect()
}

#[test]
fn test_real_loader_describes_library_schemas() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }
    let (dir, config) = project();

    let declarations = loader(&config).load(&module(SITE_MODULE)).unwrap();
    assert_eq!(
        declarations.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["pages", "authors"]
    );
    assert_eq!(declarations["authors"].kind, CollectionType::Data);

    let walker = SchemaWalker::new(&DraftConverter);
    let pages = walker.walk_collection(&declarations["pages"]);

    let union = &pages.discriminated_unions[0];
    assert_eq!(
        union.path,
        vec![PathSegment::field("blocks"), PathSegment::ArrayItems]
    );
    let labels: Vec<&str> = union.options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["Hero Block", "Cta"]);
    assert_eq!(pages.warnings.len(), 1);
    assert!(pages.warnings[0].message.contains("option 1 skipped"));
    assert_eq!(display_path(&pages.warnings[0].path), "blocks.[]");

    let properties = &pages.schema["properties"];
    assert_eq!(properties["title"], json!({ "type": "string", "minLength": 1 }));
    assert_eq!(properties["cover"], json!({ "type": "string" }));
    assert_eq!(properties["slug"], json!({ "type": "string" }));
    assert_eq!(pages.schema["required"], json!(["title", "slug", "blocks"]));
    assert_eq!(
        union.options[1].schema["properties"]["href"],
        json!({ "type": "string", "format": "uri" })
    );

    let authors = walker.walk_collection(&declarations["authors"]);
    assert_eq!(
        authors.schema["properties"]["name"],
        json!({ "type": "string" })
    );

    assert!(staged_files(dir.path()).is_empty());
}

#[test]
fn test_open_handles_do_not_hold_the_loader() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }
    let (dir, config) = project();
    let started = Instant::now();

    let declarations = loader(&config)
        .load(&module(
            "setInterval(() => {}, 1000);\nexport const collections = {};",
        ))
        .unwrap();

    assert!(declarations.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "loader waited {:?} for the module's timer",
        started.elapsed()
    );
    assert!(staged_files(dir.path()).is_empty());
}

#[test]
fn test_throwing_module_reports_runtime_error() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }
    let (dir, config) = project();

    let err = loader(&config)
        .load(&module("throw new Error(\"user boom\");"))
        .unwrap_err();
    let CompileError::Load(LoadError::Runtime { message, .. }) = &err else {
        panic!("expected a runtime error, got {err:?}");
    };
    assert_eq!(message, "user boom");
    assert!(staged_files(dir.path()).is_empty());
}

#[test]
fn test_missing_collections_export_through_runtime() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }
    let (_dir, config) = project();

    let err = loader(&config)
        .load(&module("export const schemas = {};"))
        .unwrap_err();
    assert!(matches!(err, CompileError::ConfigShape(_)));
    assert!(err.to_string().contains("`collections`"));
}

#[test]
fn test_bundle_script_replies_promptly() {
    if !node_available() {
        eprintln!("node not found, skipping");
        return;
    }
    let (dir, config) = project();
    let entry = dir.path().join("src/content/config.mjs");
    fs::create_dir_all(entry.parent().unwrap()).unwrap();
    fs::write(&entry, "export const collections = {};\n").unwrap();
    let started = Instant::now();

    match EsbuildBundler::new(&config).bundle(&entry) {
        Ok(bundle) => assert!(bundle.code.contains("collections")),
        Err(BundleError::Tool(message)) => {
            assert!(message.contains("esbuild is not available"), "{message}")
        }
        Err(other) => panic!("unexpected bundle error: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
}
