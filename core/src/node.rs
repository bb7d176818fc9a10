//! Portable model of an in-memory validation-schema object.
//!
//! The runtime that evaluates a user's schema-definition module reports each
//! validation object as a tree of [`SchemaNode`]s, tagged by `kind`. The set of
//! kinds is closed; anything the runtime cannot describe arrives as
//! [`SchemaNode::Other`], and kinds this crate does not know deserialize to
//! [`SchemaNode::Unrecognized`]. Consumers treat both as opaque leaves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node of a validation-schema tree.
///
/// # Examples
///
/// ```
/// use collection_schema_core::SchemaNode;
///
/// let node: SchemaNode = serde_json::from_str(
///     r#"{"kind":"object","shape":{"title":{"kind":"string"}}}"#,
/// ).unwrap();
/// assert_eq!(node.kind_name(), "object");
/// assert!(node.as_object_shape().unwrap().contains_key("title"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaNode {
    /// Object with named fields, in declaration order.
    Object { shape: IndexMap<String, SchemaNode> },
    /// Homogeneous array.
    Array {
        element: Box<SchemaNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<u64>,
    },
    /// Union of object shapes distinguished by a literal field.
    DiscriminatedUnion {
        discriminator: String,
        options: Vec<SchemaNode>,
    },
    /// Plain (undiscriminated) union.
    Union { options: Vec<SchemaNode> },
    Optional { inner: Box<SchemaNode> },
    Nullable { inner: Box<SchemaNode> },
    Default {
        inner: Box<SchemaNode>,
        #[serde(default)]
        value: Value,
    },
    /// Refinements, transforms, brands, readonly and catch wrappers.
    Effects { inner: Box<SchemaNode> },
    Literal {
        #[serde(default)]
        value: Value,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Number {
        #[serde(default)]
        integer: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Boolean,
    Date,
    Null,
    Any,
    Enum { values: Vec<String> },
    Record { value: Box<SchemaNode> },
    Tuple { items: Vec<SchemaNode> },
    /// Cross-collection reference produced by the content shim.
    Reference { collection: String },
    /// A library kind the runtime reported but could not describe.
    Other { type_name: String },
    /// A `kind` tag this crate does not know.
    #[serde(other)]
    Unrecognized,
}

impl SchemaNode {
    /// Shorthand for a string node without constraints.
    pub fn string() -> Self {
        Self::String {
            format: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Shorthand for a string literal node.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Shorthand for an unconstrained array of `element`.
    pub fn array(element: SchemaNode) -> Self {
        Self::Array {
            element: Box::new(element),
            min_items: None,
            max_items: None,
        }
    }

    /// Builds an object node from `(field, node)` pairs, keeping their order.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, SchemaNode)>,
    {
        Self::Object {
            shape: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Wraps `inner` as optional.
    pub fn optional(inner: SchemaNode) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    /// The serialized `kind` tag of this node.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
            Self::DiscriminatedUnion { .. } => "discriminated_union",
            Self::Union { .. } => "union",
            Self::Optional { .. } => "optional",
            Self::Nullable { .. } => "nullable",
            Self::Default { .. } => "default",
            Self::Effects { .. } => "effects",
            Self::Literal { .. } => "literal",
            Self::String { .. } => "string",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Null => "null",
            Self::Any => "any",
            Self::Enum { .. } => "enum",
            Self::Record { .. } => "record",
            Self::Tuple { .. } => "tuple",
            Self::Reference { .. } => "reference",
            Self::Other { .. } => "other",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Returns the wrapped node for transparent wrapper kinds
    /// (optional, nullable, default, effects).
    pub fn wrapped(&self) -> Option<&SchemaNode> {
        match self {
            Self::Optional { inner }
            | Self::Nullable { inner }
            | Self::Default { inner, .. }
            | Self::Effects { inner } => Some(inner),
            _ => None,
        }
    }

    /// Returns the field map when this node is an object.
    pub fn as_object_shape(&self) -> Option<&IndexMap<String, SchemaNode>> {
        match self {
            Self::Object { shape } => Some(shape),
            _ => None,
        }
    }

    /// Returns the literal value when this node is a literal.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal { value } => Some(value),
            _ => None,
        }
    }
}
