//! The compile pipeline: resolve → bundle → load → walk → validate.

use std::sync::Arc;

use chrono::Utc;
use collection_schema_core::{
    CollectionDeclaration, CollectionSchema, SchemaSet, SchemaWarning, ValidationError,
    validate_collection,
};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::bundler::{Bundler, EsbuildBundler};
use crate::config::EngineConfig;
use crate::converter::{DraftConverter, SchemaConverter};
use crate::error::CompileError;
use crate::loader::{DynamicLoader, ModuleRuntime, NodeRuntime};
use crate::source::resolve_source;
use crate::walker::SchemaWalker;

/// One full compilation of a schema-definition module.
pub trait CompilePipeline: Send + Sync {
    fn compile(&self) -> Result<SchemaSet, CompileError>;
}

impl<P: CompilePipeline + ?Sized> CompilePipeline for Arc<P> {
    fn compile(&self) -> Result<SchemaSet, CompileError> {
        (**self).compile()
    }
}

/// Production pipeline over a [`Bundler`], a [`ModuleRuntime`] and a
/// [`SchemaConverter`].
pub struct SchemaCompiler<B, R, C> {
    config: EngineConfig,
    bundler: B,
    loader: DynamicLoader<R>,
    converter: C,
}

impl SchemaCompiler<EsbuildBundler, NodeRuntime, DraftConverter> {
    /// Pipeline that bundles with esbuild and imports with node.
    pub fn from_config(config: EngineConfig) -> Self {
        let bundler = EsbuildBundler::new(&config);
        let runtime = NodeRuntime::new(&config);
        Self::new(config, bundler, runtime, DraftConverter)
    }
}

impl<B, R, C> SchemaCompiler<B, R, C>
where
    B: Bundler,
    R: ModuleRuntime,
    C: SchemaConverter,
{
    pub fn new(config: EngineConfig, bundler: B, runtime: R, converter: C) -> Self {
        let loader = DynamicLoader::new(config.staging_dir(), runtime);
        Self {
            config,
            bundler,
            loader,
            converter,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<B, R, C> CompilePipeline for SchemaCompiler<B, R, C>
where
    B: Bundler,
    R: ModuleRuntime,
    C: SchemaConverter,
{
    fn compile(&self) -> Result<SchemaSet, CompileError> {
        let source = resolve_source(&self.config)?;
        debug!(source = %source.path().display(), "Resolved schema definition");

        let bundle = self.bundler.bundle(source.path())?;
        let declarations = self.loader.load(&bundle)?;
        let declarations: Vec<CollectionDeclaration> = declarations.into_values().collect();

        let collections = compile_collections(&declarations, &self.converter);

        let mut set = SchemaSet::new(Utc::now().to_rfc3339());
        set.source = Some(source.path().display().to_string());
        for collection in collections {
            set.insert(collection);
        }
        info!(
            source = %source.path().display(),
            collections = set.len(),
            unions = set.union_count(),
            "Compiled collection schemas"
        );
        Ok(set)
    }
}

/// Walks every declaration in parallel, keeping declaration order, and
/// appends structural validation findings as warnings.
pub fn compile_collections(
    declarations: &[CollectionDeclaration],
    converter: &dyn SchemaConverter,
) -> Vec<CollectionSchema> {
    let walker = SchemaWalker::new(converter);
    declarations
        .par_iter()
        .map(|declaration| {
            let mut collection = walker.walk_collection(declaration);
            let findings = validate_collection(&collection);
            collection
                .warnings
                .extend(findings.iter().map(validation_warning));
            collection
        })
        .collect()
}

fn validation_warning(finding: &ValidationError) -> SchemaWarning {
    SchemaWarning::new(&[], finding.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_schema_core::{CollectionType, SchemaNode};

    fn declaration(name: &str, schema: Option<SchemaNode>) -> CollectionDeclaration {
        CollectionDeclaration {
            name: name.into(),
            kind: CollectionType::Content,
            raw_schema: schema,
        }
    }

    #[test]
    fn test_compile_collections_preserves_order() {
        let declarations: Vec<_> = (0..32)
            .map(|i| declaration(&format!("c{i}"), Some(SchemaNode::string())))
            .collect();
        let collections = compile_collections(&declarations, &DraftConverter);
        let names: Vec<String> = collections.into_iter().map(|c| c.name).collect();
        let expected: Vec<String> = (0..32).map(|i| format!("c{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_validation_findings_become_warnings() {
        let empty_union = SchemaNode::object([(
            "blocks",
            SchemaNode::array(SchemaNode::DiscriminatedUnion {
                discriminator: "type".into(),
                options: vec![SchemaNode::object([("type", SchemaNode::string())])],
            }),
        )]);
        let collections = compile_collections(&[declaration("pages", Some(empty_union))], &DraftConverter);

        let messages: Vec<&str> = collections[0]
            .warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("option 0 skipped"));
        assert!(messages[1].contains("no usable options"));
    }
}
