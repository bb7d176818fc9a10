//! Compiled collection schema types.
//!
//! These are the externally visible results of a compilation: one
//! [`CollectionSchema`] per declared collection, each carrying a JSON-Schema
//! document and the [`DiscriminatedUnion`]s found inside it. All types
//! serialize with [`serde`] in camelCase so they can be handed to a form UI
//! as-is.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::SchemaNode;

/// Version of the compiled schema contract (semver).
pub const SCHEMA_CONTRACT_VERSION: &str = "1.0.0";

/// A JSON-Schema document. Key order is preserved.
pub type JsonSchemaDoc = Value;

/// Returns the schema substituted for nodes that could not be converted.
///
/// # Examples
///
/// ```
/// let doc = collection_schema_core::fallback_schema();
/// assert_eq!(doc["type"], "object");
/// assert!(doc["properties"].as_object().unwrap().is_empty());
/// ```
pub fn fallback_schema() -> JsonSchemaDoc {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Kind of a content collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Markdown/MDX entries with front matter (the default).
    #[default]
    Content,
    /// JSON/YAML data entries.
    Data,
}

impl CollectionType {
    /// Parses the `type` string a schema module declares.
    ///
    /// Returns `None` for anything other than `"content"` or `"data"`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "content" => Some(Self::Content),
            "data" => Some(Self::Data),
            _ => None,
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// One collection exported by a schema-definition module, before walking.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDeclaration {
    pub name: String,
    pub kind: CollectionType,
    /// `None` when the collection declares no schema.
    pub raw_schema: Option<SchemaNode>,
}

/// One hop of a path from a schema root to a nested node.
///
/// Serialized as the field name, or as `"[]"` for an array's items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Step into an object property.
    Field(String),
    /// Step into an array's item schema.
    ArrayItems,
}

impl PathSegment {
    /// Serialized form of [`PathSegment::ArrayItems`].
    pub const ARRAY_MARKER: &'static str = "[]";

    /// Convenience constructor for a field segment.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::ArrayItems => f.write_str(Self::ARRAY_MARKER),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(raw: &str) -> Self {
        if raw == Self::ARRAY_MARKER {
            Self::ArrayItems
        } else {
            Self::Field(raw.to_string())
        }
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Renders a path as `blocks.[].items`, or `<root>` when empty.
pub fn display_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// One variant of a discriminated union, as offered to an editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionOption {
    /// Literal value of the discriminator field for this variant.
    pub value: Value,
    /// Human-readable name derived from `value`.
    pub label: String,
    /// JSON-Schema document for the variant's object shape.
    pub schema: JsonSchemaDoc,
}

impl UnionOption {
    /// Key used for this option in a `blockTypes` map.
    ///
    /// String literals are used verbatim; other literals use their JSON text.
    ///
    /// # Examples
    ///
    /// ```
    /// use collection_schema_core::UnionOption;
    ///
    /// let opt = UnionOption { value: "hero".into(), label: "Hero".into(), schema: serde_json::json!({}) };
    /// assert_eq!(opt.key(), "hero");
    /// let opt = UnionOption { value: 2.into(), label: "2".into(), schema: serde_json::json!({}) };
    /// assert_eq!(opt.key(), "2");
    /// ```
    pub fn key(&self) -> String {
        literal_key(&self.value)
    }
}

/// String form of a literal used for map keys and labels.
pub fn literal_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A discriminated union found inside a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatedUnion {
    /// Path from the collection root to the union node.
    pub path: Vec<PathSegment>,
    /// Name of the field whose literal value selects the variant.
    pub discriminator: String,
    /// Surviving variants, in declaration order.
    pub options: Vec<UnionOption>,
}

/// Non-fatal problem recorded while compiling a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaWarning {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl SchemaWarning {
    pub fn new(path: &[PathSegment], message: impl Into<String>) -> Self {
        Self {
            path: path.to_vec(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", display_path(&self.path), self.message)
    }
}

/// Compiled schema for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CollectionType,
    pub schema: JsonSchemaDoc,
    pub discriminated_unions: Vec<DiscriminatedUnion>,
    /// Conversion fallbacks and validation findings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SchemaWarning>,
}
