use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{CollectionSchema, JsonSchemaDoc, enrich_schema_with_block_types};

/// Every compiled collection of one schema-definition module.
///
/// Collections keep the order in which the module declared them.
///
/// # Examples
///
/// ```
/// use collection_schema_core::*;
///
/// let mut set = SchemaSet::new("2024-01-15T10:30:00Z");
/// set.insert(CollectionSchema {
///     name: "blog".into(),
///     kind: CollectionType::Content,
///     schema: fallback_schema(),
///     discriminated_unions: Vec::new(),
///     warnings: Vec::new(),
/// });
///
/// assert_eq!(set.len(), 1);
/// assert_eq!(set.names().collect::<Vec<_>>(), vec!["blog"]);
/// assert!(set.get("blog").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSet {
    /// Schema contract version (from
    /// [`SCHEMA_CONTRACT_VERSION`](crate::SCHEMA_CONTRACT_VERSION)).
    pub schema_version: String,
    /// Absolute path of the schema-definition module, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// RFC 3339 timestamp of the compilation.
    pub generated_at: String,
    pub collections: IndexMap<String, CollectionSchema>,
}

impl SchemaSet {
    pub fn new(generated_at: impl Into<String>) -> Self {
        Self {
            schema_version: crate::SCHEMA_CONTRACT_VERSION.to_string(),
            source: None,
            generated_at: generated_at.into(),
            collections: IndexMap::new(),
        }
    }

    /// Adds a collection under its own name, replacing any previous entry.
    pub fn insert(&mut self, collection: CollectionSchema) -> Option<CollectionSchema> {
        self.collections.insert(collection.name.clone(), collection)
    }

    pub fn get(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Collection names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, CollectionSchema> {
        self.collections.iter()
    }

    /// Total number of discriminated unions across all collections.
    pub fn union_count(&self) -> usize {
        self.collections
            .values()
            .map(|c| c.discriminated_unions.len())
            .sum()
    }

    /// Returns the named collection's schema with block types attached.
    pub fn enriched(&self, name: &str) -> Option<JsonSchemaDoc> {
        self.get(name)
            .map(|c| enrich_schema_with_block_types(&c.schema, &c.discriminated_unions))
    }
}
