//! Output formatting for compiled schema sets.

use collection_schema_core::{
    CollectionSchema, SchemaSet, display_path, enrich_schema_with_block_types,
};
use serde_json::Value;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
}

/// Returns `collection` with block types merged into its schema.
pub fn enrich_collection(collection: &CollectionSchema) -> CollectionSchema {
    CollectionSchema {
        schema: enrich_schema_with_block_types(&collection.schema, &collection.discriminated_unions),
        ..collection.clone()
    }
}

/// Returns a copy of `set` with every collection enriched.
pub fn enrich_set(set: &SchemaSet) -> SchemaSet {
    let mut enriched = set.clone();
    for collection in enriched.collections.values_mut() {
        *collection = enrich_collection(collection);
    }
    enriched
}

/// Formats a whole schema set.
pub fn format_schema_set(set: &SchemaSet, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(set)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(set).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(set_to_markdown(set)),
    }
}

/// Formats one collection.
pub fn format_collection(
    collection: &CollectionSchema,
    format: OutputFormat,
) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(collection)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => serde_yaml::to_string(collection)
            .map_err(|e| format!("YAML serialization failed: {e}")),
        OutputFormat::Markdown => Ok(collection_to_markdown(collection)),
    }
}

fn set_to_markdown(set: &SchemaSet) -> String {
    let mut out = String::new();
    out.push_str("# Collections\n\n");
    if let Some(ref source) = set.source {
        out.push_str(&format!("**Source:** `{source}`\n\n"));
    }
    out.push_str(&format!("**Generated:** {}\n\n", set.generated_at));

    if set.is_empty() {
        out.push_str("_No collections declared._\n");
        return out;
    }

    out.push_str("| Collection | Type | Fields | Block unions |\n");
    out.push_str("|------------|------|--------|--------------|\n");
    for (name, collection) in set.iter() {
        out.push_str(&format!(
            "| `{name}` | {} | {} | {} |\n",
            collection.kind,
            properties(&collection.schema).len(),
            collection.discriminated_unions.len()
        ));
    }
    out.push('\n');

    for collection in set.collections.values() {
        out.push_str(&collection_to_markdown(collection).replacen("# ", "## ", 1));
    }
    out
}

fn collection_to_markdown(collection: &CollectionSchema) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {} ({})\n\n", collection.name, collection.kind));

    let fields = properties(&collection.schema);
    if !fields.is_empty() {
        let required = required_fields(&collection.schema);
        out.push_str("| Field | Type | Required |\n");
        out.push_str("|-------|------|----------|\n");
        for (name, schema) in fields {
            let req = if required.contains(&name.as_str()) { "yes" } else { "no" };
            out.push_str(&format!("| `{name}` | {} | {req} |\n", type_label(schema)));
        }
        out.push('\n');
    }

    for union in &collection.discriminated_unions {
        out.push_str(&format!(
            "**Blocks at `{}`** (discriminator `{}`):\n\n",
            display_path(&union.path),
            union.discriminator
        ));
        for option in &union.options {
            out.push_str(&format!("- {} (`{}`)\n", option.label, option.key()));
        }
        out.push('\n');
    }

    if !collection.warnings.is_empty() {
        out.push_str("**Warnings:**\n\n");
        for warning in &collection.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
        out.push('\n');
    }
    out
}

fn properties(schema: &Value) -> Vec<(&String, &Value)> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.iter().collect())
        .unwrap_or_default()
}

fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn type_label(schema: &Value) -> String {
    match schema.get("type") {
        Some(Value::String(kind)) => match schema.get("format").and_then(Value::as_str) {
            Some(format) => format!("{kind} ({format})"),
            None => kind.clone(),
        },
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" \\| "),
        _ if schema.get("anyOf").is_some() => "union".to_string(),
        _ if schema.get("enum").is_some() => "enum".to_string(),
        _ => "any".to_string(),
    }
}
