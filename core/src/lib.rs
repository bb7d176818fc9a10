//! Core types for compiled content-collection schemas.
//!
//! This crate defines the data model shared by the compilation engine and its
//! consumers:
//!
//! - [`SchemaNode`]: portable description of a validation-schema object as
//!   reported by the runtime that evaluated the user's schema module.
//! - [`CollectionSchema`]: one compiled collection: a JSON-Schema document
//!   plus the [`DiscriminatedUnion`]s found inside it.
//! - [`SchemaSet`]: every compiled collection of one module, in declaration
//!   order.
//!
//! Enrichment ([`enrich_schema_with_block_types`]) attaches union variants to
//! array fields for form rendering. Validation ([`validate_collection`]) flags
//! unions an editor could not use.
//!
//! # Example
//!
//! ```
//! use collection_schema_core::*;
//! use serde_json::json;
//!
//! let union = DiscriminatedUnion {
//!     path: vec![PathSegment::field("blocks"), PathSegment::ArrayItems],
//!     discriminator: "type".into(),
//!     options: vec![UnionOption {
//!         value: "heroBlock".into(),
//!         label: humanize_label("heroBlock"),
//!         schema: json!({ "type": "object" }),
//!     }],
//! };
//! assert_eq!(union.options[0].label, "Hero Block");
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": { "blocks": { "type": "array", "items": {} } }
//! });
//! let enriched = enrich_schema_with_block_types(&schema, &[union]);
//! assert!(enriched["properties"]["blocks"]["blockTypes"]["heroBlock"].is_object());
//! ```

mod enrich;
mod label;
mod node;
mod schema_set;
mod types;
mod validate;

pub use enrich::{BLOCK_TYPES_KEY, enrich_schema_with_block_types};
pub use label::{humanize_label, label_for_literal};
pub use node::SchemaNode;
pub use schema_set::SchemaSet;
pub use types::*;
pub use validate::{ValidationError, validate_collection};
