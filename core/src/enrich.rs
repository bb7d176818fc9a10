//! Block-type enrichment.
//!
//! Merges discriminated-union metadata into a JSON-Schema document so a form
//! renderer can offer "add block" choices on array fields. Enrichment is
//! best-effort: a union whose recorded path does not match the document is
//! skipped without error.

use serde_json::{Map, Value};

use crate::{DiscriminatedUnion, JsonSchemaDoc, PathSegment};

/// Key attached to array nodes that hold discriminated-union items.
pub const BLOCK_TYPES_KEY: &str = "blockTypes";

/// Returns a copy of `schema` with a `blockTypes` map attached to every array
/// field that holds one of `unions`.
///
/// The input document is not modified.
///
/// # Examples
///
/// ```
/// use collection_schema_core::*;
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "properties": { "blocks": { "type": "array", "items": { "anyOf": [] } } }
/// });
/// let union = DiscriminatedUnion {
///     path: vec![PathSegment::field("blocks"), PathSegment::ArrayItems],
///     discriminator: "type".into(),
///     options: vec![UnionOption {
///         value: "hero".into(),
///         label: "Hero".into(),
///         schema: json!({ "type": "object" }),
///     }],
/// };
///
/// let enriched = enrich_schema_with_block_types(&schema, &[union]);
/// assert!(enriched["properties"]["blocks"]["blockTypes"]["hero"].is_object());
/// assert!(schema["properties"]["blocks"].get("blockTypes").is_none());
/// ```
pub fn enrich_schema_with_block_types(
    schema: &JsonSchemaDoc,
    unions: &[DiscriminatedUnion],
) -> JsonSchemaDoc {
    let mut enriched = schema.clone();
    for union in unions {
        let Some(node) = resolve_mut(&mut enriched, &union.path) else {
            continue;
        };
        if !is_array_node(node) {
            continue;
        }
        let Some(obj) = node.as_object_mut() else {
            continue;
        };
        let block_types: Map<String, Value> = union
            .options
            .iter()
            .map(|option| (option.key(), option.schema.clone()))
            .collect();
        obj.insert(BLOCK_TYPES_KEY.to_string(), Value::Object(block_types));
    }
    enriched
}

/// Walks `root` along `path`.
///
/// A trailing array marker resolves to the array node itself; an inner array
/// marker steps into `items`.
fn resolve_mut<'a>(root: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = root;
    for (idx, segment) in path.iter().enumerate() {
        let is_last = idx + 1 == path.len();
        current = match segment {
            PathSegment::Field(name) => current.get_mut("properties")?.get_mut(name)?,
            PathSegment::ArrayItems if is_last => current,
            PathSegment::ArrayItems => current.get_mut("items")?,
        };
    }
    Some(current)
}

fn is_array_node(node: &Value) -> bool {
    match node.get("type") {
        Some(Value::String(kind)) => kind == "array",
        Some(Value::Array(kinds)) => kinds.iter().any(|k| k == "array"),
        _ => false,
    }
}
