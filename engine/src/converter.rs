//! JSON-Schema conversion of [`SchemaNode`] trees.
//!
//! [`DraftConverter`] emits draft-07 documents shaped the way
//! `zod-to-json-schema` shapes them, so editors built against that output keep
//! working. Conversion is strict through [`SchemaConverter::convert`];
//! [`SchemaConverter::convert_lenient`] substitutes
//! [`fallback_schema`] for every sub-node that cannot be converted and reports
//! where that happened.

use collection_schema_core::{JsonSchemaDoc, PathSegment, SchemaNode, fallback_schema};
use serde_json::{Map, Number, Value, json};

use crate::error::SchemaConversionError;

/// A sub-node that was replaced by the fallback schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionFailure {
    pub path: Vec<PathSegment>,
    pub error: SchemaConversionError,
}

/// Result of a lenient conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub doc: JsonSchemaDoc,
    pub failures: Vec<ConversionFailure>,
}

/// Converts schema nodes to JSON-Schema documents.
pub trait SchemaConverter: Send + Sync {
    /// Converts `node`, failing on the first unconvertible sub-node.
    fn convert(&self, node: &SchemaNode) -> Result<JsonSchemaDoc, SchemaConversionError>;

    /// Converts `node`, never failing.
    ///
    /// The default falls back for the whole node; implementations may recover
    /// at a finer grain. `path` locates `node` within its collection.
    fn convert_lenient(&self, node: &SchemaNode, path: &[PathSegment]) -> Converted {
        match self.convert(node) {
            Ok(doc) => Converted {
                doc,
                failures: Vec::new(),
            },
            Err(error) => Converted {
                doc: fallback_schema(),
                failures: vec![ConversionFailure {
                    path: path.to_vec(),
                    error,
                }],
            },
        }
    }
}

/// Draft-07 converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftConverter;

impl SchemaConverter for DraftConverter {
    fn convert(&self, node: &SchemaNode) -> Result<JsonSchemaDoc, SchemaConversionError> {
        Conversion {
            path: Vec::new(),
            failures: None,
        }
        .node(node)
    }

    fn convert_lenient(&self, node: &SchemaNode, path: &[PathSegment]) -> Converted {
        let mut failures = Vec::new();
        let mut conversion = Conversion {
            path: path.to_vec(),
            failures: Some(&mut failures),
        };
        let doc = conversion.child(None, node).unwrap_or_else(|_| fallback_schema());
        Converted { doc, failures }
    }
}

/// One traversal. In lenient mode `failures` collects recovered sub-nodes.
struct Conversion<'a> {
    path: Vec<PathSegment>,
    failures: Option<&'a mut Vec<ConversionFailure>>,
}

impl Conversion<'_> {
    fn child(
        &mut self,
        segment: Option<PathSegment>,
        node: &SchemaNode,
    ) -> Result<Value, SchemaConversionError> {
        let pushed = segment.is_some();
        if let Some(segment) = segment {
            self.path.push(segment);
        }
        let result = match self.node(node) {
            Ok(doc) => Ok(doc),
            Err(error) => match self.failures.as_deref_mut() {
                Some(failures) => {
                    failures.push(ConversionFailure {
                        path: self.path.clone(),
                        error,
                    });
                    Ok(fallback_schema())
                }
                None => Err(error),
            },
        };
        if pushed {
            self.path.pop();
        }
        result
    }

    fn node(&mut self, node: &SchemaNode) -> Result<Value, SchemaConversionError> {
        match node {
            SchemaNode::Object { shape } => {
                let mut properties = Map::with_capacity(shape.len());
                let mut required = Vec::new();
                for (field, child) in shape {
                    properties.insert(
                        field.clone(),
                        self.child(Some(PathSegment::field(field.as_str())), child)?,
                    );
                    if !is_optional_field(child) {
                        required.push(Value::String(field.clone()));
                    }
                }
                let mut doc = Map::new();
                doc.insert("type".into(), "object".into());
                doc.insert("properties".into(), Value::Object(properties));
                if !required.is_empty() {
                    doc.insert("required".into(), Value::Array(required));
                }
                doc.insert("additionalProperties".into(), Value::Bool(false));
                Ok(Value::Object(doc))
            }
            SchemaNode::Array {
                element,
                min_items,
                max_items,
            } => {
                let mut doc = Map::new();
                doc.insert("type".into(), "array".into());
                doc.insert(
                    "items".into(),
                    self.child(Some(PathSegment::ArrayItems), element)?,
                );
                if let Some(min) = min_items {
                    doc.insert("minItems".into(), (*min).into());
                }
                if let Some(max) = max_items {
                    doc.insert("maxItems".into(), (*max).into());
                }
                Ok(Value::Object(doc))
            }
            SchemaNode::DiscriminatedUnion { options, .. } | SchemaNode::Union { options } => {
                let any_of = options
                    .iter()
                    .map(|option| self.child(None, option))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(json!({ "anyOf": any_of }))
            }
            SchemaNode::Optional { inner } | SchemaNode::Effects { inner } => {
                self.child(None, inner)
            }
            SchemaNode::Nullable { inner } => Ok(nullable(self.child(None, inner)?)),
            SchemaNode::Default { inner, value } => {
                let mut doc = self.child(None, inner)?;
                if let Some(obj) = doc.as_object_mut() {
                    obj.insert("default".into(), value.clone());
                }
                Ok(doc)
            }
            SchemaNode::Literal { value } => literal(value),
            SchemaNode::String {
                format,
                min_length,
                max_length,
                pattern,
            } => {
                let mut doc = Map::new();
                doc.insert("type".into(), "string".into());
                if let Some(format) = format {
                    doc.insert("format".into(), format.clone().into());
                }
                if let Some(min) = min_length {
                    doc.insert("minLength".into(), (*min).into());
                }
                if let Some(max) = max_length {
                    doc.insert("maxLength".into(), (*max).into());
                }
                if let Some(pattern) = pattern {
                    doc.insert("pattern".into(), pattern.clone().into());
                }
                Ok(Value::Object(doc))
            }
            SchemaNode::Number {
                integer,
                minimum,
                maximum,
            } => {
                let mut doc = Map::new();
                let kind = if *integer { "integer" } else { "number" };
                doc.insert("type".into(), kind.into());
                if let Some(min) = minimum {
                    doc.insert("minimum".into(), number("number", *min)?);
                }
                if let Some(max) = maximum {
                    doc.insert("maximum".into(), number("number", *max)?);
                }
                Ok(Value::Object(doc))
            }
            SchemaNode::Boolean => Ok(json!({ "type": "boolean" })),
            SchemaNode::Date => Ok(json!({ "type": "string", "format": "date-time" })),
            SchemaNode::Null => Ok(json!({ "type": "null" })),
            SchemaNode::Any => Ok(json!({})),
            SchemaNode::Enum { values } => {
                if values.is_empty() {
                    return Err(SchemaConversionError::Invalid {
                        kind: node.kind_name().into(),
                        message: "no values".into(),
                    });
                }
                Ok(json!({ "type": "string", "enum": values }))
            }
            SchemaNode::Record { value } => {
                let values = self.child(None, value)?;
                Ok(json!({ "type": "object", "additionalProperties": values }))
            }
            SchemaNode::Tuple { items } => {
                let converted = items
                    .iter()
                    .map(|item| self.child(Some(PathSegment::ArrayItems), item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(json!({
                    "type": "array",
                    "minItems": items.len(),
                    "maxItems": items.len(),
                    "items": converted,
                }))
            }
            SchemaNode::Reference { collection } => {
                Ok(json!({ "type": "string", "reference": collection }))
            }
            SchemaNode::Other { type_name } => Err(SchemaConversionError::Unsupported {
                kind: type_name.clone(),
            }),
            SchemaNode::Unrecognized => Err(SchemaConversionError::Unsupported {
                kind: node.kind_name().into(),
            }),
        }
    }
}

/// Whether an object field may be omitted.
fn is_optional_field(node: &SchemaNode) -> bool {
    match node {
        SchemaNode::Optional { .. } | SchemaNode::Default { .. } => true,
        SchemaNode::Effects { inner } => is_optional_field(inner),
        _ => false,
    }
}

fn nullable(mut doc: Value) -> Value {
    let Some(obj) = doc.as_object_mut() else {
        return json!({ "anyOf": [doc, { "type": "null" }] });
    };
    match obj.get_mut("type") {
        Some(Value::String(kind)) => {
            let kind = std::mem::take(kind);
            obj.insert("type".into(), json!([kind, "null"]));
            doc
        }
        Some(Value::Array(kinds)) => {
            if !kinds.iter().any(|k| k == "null") {
                kinds.push("null".into());
            }
            doc
        }
        _ => json!({ "anyOf": [doc, { "type": "null" }] }),
    }
}

fn literal(value: &Value) -> Result<Value, SchemaConversionError> {
    let kind = match value {
        Value::Null => return Ok(json!({ "type": "null" })),
        Value::String(_) => "string",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Array(_) | Value::Object(_) => {
            return Err(SchemaConversionError::Invalid {
                kind: "literal".into(),
                message: "literal value must be a string, number, boolean or null".into(),
            });
        }
    };
    Ok(json!({ "type": kind, "const": value }))
}

/// JSON number for a bound, written as an integer when it has no fraction.
fn number(kind: &str, value: f64) -> Result<Value, SchemaConversionError> {
    if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        return Ok(Value::Number(Number::from(value as i64)));
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| SchemaConversionError::Invalid {
            kind: kind.to_string(),
            message: format!("bound {value} is not a finite number"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(node: &SchemaNode) -> Value {
        DraftConverter.convert(node).unwrap()
    }

    #[test]
    fn test_object_required_and_order() {
        let node = SchemaNode::object([
            ("title", SchemaNode::string()),
            ("draft", SchemaNode::Default {
                inner: Box::new(SchemaNode::Boolean),
                value: Value::Bool(false),
            }),
            ("subtitle", SchemaNode::optional(SchemaNode::string())),
            ("tags", SchemaNode::array(SchemaNode::string())),
        ]);
        let doc = convert(&node);

        let keys: Vec<&str> = doc["properties"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["title", "draft", "subtitle", "tags"]);
        assert_eq!(doc["required"], json!(["title", "tags"]));
        assert_eq!(doc["additionalProperties"], json!(false));
        assert_eq!(doc["properties"]["draft"], json!({ "type": "boolean", "default": false }));
        assert_eq!(doc["properties"]["tags"]["items"], json!({ "type": "string" }));
    }

    #[test]
    fn test_leaf_kinds() {
        assert_eq!(
            convert(&SchemaNode::String {
                format: Some("email".into()),
                min_length: Some(3),
                max_length: None,
                pattern: None,
            }),
            json!({ "type": "string", "format": "email", "minLength": 3 })
        );
        assert_eq!(
            convert(&SchemaNode::Number {
                integer: true,
                minimum: Some(0.0),
                maximum: Some(2.5),
            }),
            json!({ "type": "integer", "minimum": 0, "maximum": 2.5 })
        );
        assert_eq!(
            convert(&SchemaNode::Date),
            json!({ "type": "string", "format": "date-time" })
        );
        assert_eq!(
            convert(&SchemaNode::literal("hero")),
            json!({ "type": "string", "const": "hero" })
        );
        assert_eq!(
            convert(&SchemaNode::Enum {
                values: vec!["draft".into(), "published".into()],
            }),
            json!({ "type": "string", "enum": ["draft", "published"] })
        );
        assert_eq!(
            convert(&SchemaNode::Reference {
                collection: "authors".into(),
            }),
            json!({ "type": "string", "reference": "authors" })
        );
        assert_eq!(convert(&SchemaNode::Any), json!({}));
    }

    #[test]
    fn test_nullable_forms() {
        let string = SchemaNode::Nullable {
            inner: Box::new(SchemaNode::string()),
        };
        assert_eq!(convert(&string), json!({ "type": ["string", "null"] }));

        let union = SchemaNode::Nullable {
            inner: Box::new(SchemaNode::Union {
                options: vec![SchemaNode::string(), SchemaNode::Boolean],
            }),
        };
        let doc = convert(&union);
        assert_eq!(doc["anyOf"][1], json!({ "type": "null" }));
    }

    #[test]
    fn test_unsupported_kinds_fail_strict_conversion() {
        let node = SchemaNode::object([(
            "callback",
            SchemaNode::Other {
                type_name: "ZodFunction".into(),
            },
        )]);
        assert_eq!(
            DraftConverter.convert(&node).unwrap_err(),
            SchemaConversionError::Unsupported {
                kind: "ZodFunction".into(),
            }
        );
        assert_eq!(
            DraftConverter.convert(&SchemaNode::Unrecognized).unwrap_err(),
            SchemaConversionError::Unsupported {
                kind: "unrecognized".into(),
            }
        );
        assert_eq!(
            DraftConverter
                .convert(&SchemaNode::Enum { values: Vec::new() })
                .unwrap_err()
                .to_string(),
            "invalid enum node: no values"
        );
    }

    #[test]
    fn test_lenient_conversion_falls_back_per_sub_node() {
        let node = SchemaNode::object([
            ("title", SchemaNode::string()),
            (
                "items",
                SchemaNode::array(SchemaNode::object([(
                    "run",
                    SchemaNode::Other {
                        type_name: "ZodFunction".into(),
                    },
                )])),
            ),
        ]);
        let converted = DraftConverter.convert_lenient(&node, &[]);

        assert_eq!(converted.doc["properties"]["title"], json!({ "type": "string" }));
        assert_eq!(
            converted.doc["properties"]["items"]["items"]["properties"]["run"],
            fallback_schema()
        );
        assert_eq!(converted.failures.len(), 1);
        assert_eq!(
            converted.failures[0].path,
            vec![
                PathSegment::field("items"),
                PathSegment::ArrayItems,
                PathSegment::field("run"),
            ]
        );
    }

    #[test]
    fn test_lenient_root_failure_uses_fallback() {
        let base = vec![PathSegment::field("blocks"), PathSegment::ArrayItems];
        let converted = DraftConverter.convert_lenient(&SchemaNode::Unrecognized, &base);
        assert_eq!(converted.doc, fallback_schema());
        assert_eq!(converted.failures[0].path, base);
    }

    #[test]
    fn test_invalid_bounds_and_literals() {
        let nan = SchemaNode::Number {
            integer: false,
            minimum: Some(f64::NAN),
            maximum: None,
        };
        assert!(matches!(
            DraftConverter.convert(&nan),
            Err(SchemaConversionError::Invalid { .. })
        ));
        let object_literal = SchemaNode::Literal { value: json!({}) };
        assert!(DraftConverter.convert(&object_literal).is_err());
    }
}
