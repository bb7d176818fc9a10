//! Schema walker.
//!
//! Converts one collection's raw schema to JSON Schema and, in the same
//! depth-first pass, records every discriminated union along with the path
//! that leads to it.

use collection_schema_core::{
    CollectionDeclaration, CollectionSchema, DiscriminatedUnion, JsonSchemaDoc, PathSegment,
    SchemaNode, SchemaWarning, UnionOption, display_path, fallback_schema, label_for_literal,
};
use tracing::{debug, warn};

use crate::converter::{Converted, SchemaConverter};

/// Everything a walk produces for one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutput {
    pub schema: JsonSchemaDoc,
    pub unions: Vec<DiscriminatedUnion>,
    pub warnings: Vec<SchemaWarning>,
}

/// Walks schema trees with a [`SchemaConverter`].
pub struct SchemaWalker<'a> {
    converter: &'a dyn SchemaConverter,
}

impl<'a> SchemaWalker<'a> {
    pub fn new(converter: &'a dyn SchemaConverter) -> Self {
        Self { converter }
    }

    /// Converts `node` and discovers the unions inside it.
    pub fn walk(&self, node: &SchemaNode) -> WalkOutput {
        let mut warnings = Vec::new();
        let schema = self.convert(node, &[], &mut warnings);
        let mut unions = Vec::new();
        let mut path = Vec::new();
        self.discover(node, &mut path, &mut unions, &mut warnings);
        WalkOutput {
            schema,
            unions,
            warnings,
        }
    }

    /// Compiles one declaration into its externally visible form.
    pub fn walk_collection(&self, declaration: &CollectionDeclaration) -> CollectionSchema {
        let output = match &declaration.raw_schema {
            Some(node) => self.walk(node),
            None => {
                debug!(collection = %declaration.name, "Collection declares no schema");
                WalkOutput {
                    schema: fallback_schema(),
                    unions: Vec::new(),
                    warnings: Vec::new(),
                }
            }
        };
        if !output.warnings.is_empty() {
            debug!(
                collection = %declaration.name,
                count = output.warnings.len(),
                "Collection compiled with warnings"
            );
        }
        CollectionSchema {
            name: declaration.name.clone(),
            kind: declaration.kind,
            schema: output.schema,
            discriminated_unions: output.unions,
            warnings: output.warnings,
        }
    }

    fn convert(
        &self,
        node: &SchemaNode,
        path: &[PathSegment],
        warnings: &mut Vec<SchemaWarning>,
    ) -> JsonSchemaDoc {
        let Converted { doc, failures } = self.converter.convert_lenient(node, path);
        for failure in failures {
            let warning = SchemaWarning::new(&failure.path, failure.error.to_string());
            // Union options are converted again on their own; report each defect once.
            if warnings.contains(&warning) {
                continue;
            }
            warn!(
                path = %display_path(&failure.path),
                error = %failure.error,
                "Schema conversion failed, using empty object schema"
            );
            warnings.push(warning);
        }
        doc
    }

    fn discover(
        &self,
        node: &SchemaNode,
        path: &mut Vec<PathSegment>,
        unions: &mut Vec<DiscriminatedUnion>,
        warnings: &mut Vec<SchemaWarning>,
    ) {
        match node {
            SchemaNode::DiscriminatedUnion {
                discriminator,
                options,
            } => {
                let union = self.extract_union(discriminator, options, path, warnings);
                unions.push(union);
            }
            SchemaNode::Object { shape } => {
                for (field, child) in shape {
                    path.push(PathSegment::field(field.as_str()));
                    self.discover(child, path, unions, warnings);
                    path.pop();
                }
            }
            SchemaNode::Array { element, .. } => {
                path.push(PathSegment::ArrayItems);
                self.discover(element, path, unions, warnings);
                path.pop();
            }
            _ => {
                if let Some(inner) = node.wrapped() {
                    self.discover(inner, path, unions, warnings);
                }
            }
        }
    }

    fn extract_union(
        &self,
        discriminator: &str,
        options: &[SchemaNode],
        path: &[PathSegment],
        warnings: &mut Vec<SchemaWarning>,
    ) -> DiscriminatedUnion {
        let mut extracted = Vec::with_capacity(options.len());
        for (index, option) in options.iter().enumerate() {
            let value = match discriminator_literal(option, discriminator) {
                Ok(value) => value,
                Err(reason) => {
                    warn!(
                        path = %display_path(path),
                        option = index,
                        reason,
                        "Skipping discriminated union option"
                    );
                    warnings.push(SchemaWarning::new(
                        path,
                        format!("option {index} skipped: {reason}"),
                    ));
                    continue;
                }
            };
            extracted.push(UnionOption {
                label: label_for_literal(value),
                value: value.clone(),
                schema: self.convert(option, path, warnings),
            });
        }
        debug!(
            path = %display_path(path),
            discriminator,
            options = extracted.len(),
            "Found discriminated union"
        );
        DiscriminatedUnion {
            path: path.to_vec(),
            discriminator: discriminator.to_string(),
            options: extracted,
        }
    }
}

/// Returns the literal an option assigns to the discriminator field.
fn discriminator_literal<'n>(
    option: &'n SchemaNode,
    discriminator: &str,
) -> Result<&'n serde_json::Value, &'static str> {
    let shape = option.as_object_shape().ok_or("option is not an object")?;
    let field = shape
        .get(discriminator)
        .ok_or("option has no discriminator field")?;
    let value = field
        .as_literal()
        .ok_or("discriminator field is not a literal")?;
    if value.is_array() || value.is_object() {
        return Err("discriminator literal is not a scalar");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::DraftConverter;
    use collection_schema_core::CollectionType;
    use serde_json::json;

    fn block(kind: &str, fields: Vec<(&str, SchemaNode)>) -> SchemaNode {
        let mut shape = vec![("type", SchemaNode::literal(kind))];
        shape.extend(fields);
        SchemaNode::object(shape)
    }

    fn page_schema(options: Vec<SchemaNode>) -> SchemaNode {
        SchemaNode::object([
            ("title", SchemaNode::string()),
            (
                "blocks",
                SchemaNode::array(SchemaNode::DiscriminatedUnion {
                    discriminator: "type".into(),
                    options,
                }),
            ),
        ])
    }

    #[test]
    fn test_union_order_and_labels() {
        let schema = page_schema(vec![
            block("heroBlock", vec![("heading", SchemaNode::string())]),
            block("richText", vec![("body", SchemaNode::string())]),
            block("cta", vec![("href", SchemaNode::string())]),
        ]);
        let output = SchemaWalker::new(&DraftConverter).walk(&schema);

        assert_eq!(output.unions.len(), 1);
        let union = &output.unions[0];
        assert_eq!(
            union.path,
            vec![PathSegment::field("blocks"), PathSegment::ArrayItems]
        );
        assert_eq!(union.discriminator, "type");
        let labels: Vec<&str> = union.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Hero Block", "Rich Text", "Cta"]);
        let values: Vec<&serde_json::Value> = union.options.iter().map(|o| &o.value).collect();
        assert_eq!(values, vec!["heroBlock", "richText", "cta"]);
        assert_eq!(
            union.options[0].schema["properties"]["heading"],
            json!({ "type": "string" })
        );
        assert!(output.warnings.is_empty());
        assert_eq!(output.schema["properties"]["blocks"]["type"], "array");
    }

    #[test]
    fn test_non_literal_option_is_skipped() {
        let schema = page_schema(vec![
            block("heroBlock", vec![]),
            SchemaNode::object([("type", SchemaNode::string())]),
            block("cta", vec![]),
        ]);
        let output = SchemaWalker::new(&DraftConverter).walk(&schema);

        let values: Vec<&serde_json::Value> =
            output.unions[0].options.iter().map(|o| &o.value).collect();
        assert_eq!(values, vec!["heroBlock", "cta"]);
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].message.contains("option 1 skipped"));
    }

    #[test]
    fn test_nested_union_path_through_wrappers() {
        let inner_union = SchemaNode::DiscriminatedUnion {
            discriminator: "kind".into(),
            options: vec![
                SchemaNode::object([("kind", SchemaNode::literal("image"))]),
                SchemaNode::object([("kind", SchemaNode::literal("video"))]),
            ],
        };
        let schema = SchemaNode::object([(
            "sections",
            SchemaNode::optional(SchemaNode::array(SchemaNode::object([(
                "media",
                SchemaNode::Nullable {
                    inner: Box::new(SchemaNode::array(inner_union)),
                },
            )]))),
        )]);
        let output = SchemaWalker::new(&DraftConverter).walk(&schema);

        assert_eq!(output.unions.len(), 1);
        assert_eq!(
            display_path(&output.unions[0].path),
            "sections.[].media.[]"
        );
    }

    #[test]
    fn test_unconvertible_option_uses_fallback() {
        let schema = page_schema(vec![block(
            "embed",
            vec![(
                "render",
                SchemaNode::Other {
                    type_name: "ZodFunction".into(),
                },
            )],
        )]);
        let output = SchemaWalker::new(&DraftConverter).walk(&schema);

        let option = &output.unions[0].options[0];
        assert_eq!(option.label, "Embed");
        assert_eq!(option.schema["properties"]["render"], fallback_schema());
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].message.contains("ZodFunction"));
        assert_eq!(display_path(&output.warnings[0].path), "blocks.[].render");
    }

    #[test]
    fn test_collection_without_schema() {
        let declaration = CollectionDeclaration {
            name: "misc".into(),
            kind: CollectionType::Data,
            raw_schema: None,
        };
        let collection = SchemaWalker::new(&DraftConverter).walk_collection(&declaration);
        assert_eq!(collection.name, "misc");
        assert_eq!(collection.kind, CollectionType::Data);
        assert_eq!(collection.schema, fallback_schema());
        assert!(collection.discriminated_unions.is_empty());
    }

    #[test]
    fn test_unions_inside_union_options_are_not_searched() {
        let nested = SchemaNode::DiscriminatedUnion {
            discriminator: "type".into(),
            options: vec![block("inner", vec![])],
        };
        let schema = SchemaNode::DiscriminatedUnion {
            discriminator: "type".into(),
            options: vec![block("outer", vec![("children", SchemaNode::array(nested))])],
        };
        let output = SchemaWalker::new(&DraftConverter).walk(&schema);
        assert_eq!(output.unions.len(), 1);
        assert!(output.unions[0].path.is_empty());
    }
}
