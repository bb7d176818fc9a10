//! Structural validation of compiled collections.
//!
//! Catches problems that do not stop a compilation but would confuse an
//! editor UI: unions with no usable options, duplicate block types, empty
//! names.
//!
//! # Examples
//!
//! ```
//! use collection_schema_core::*;
//! use serde_json::json;
//!
//! let mut collection = CollectionSchema {
//!     name: "pages".into(),
//!     kind: CollectionType::Content,
//!     schema: json!({ "type": "object", "properties": {} }),
//!     discriminated_unions: Vec::new(),
//!     warnings: Vec::new(),
//! };
//! assert!(validate_collection(&collection).is_empty());
//!
//! collection.discriminated_unions.push(DiscriminatedUnion {
//!     path: vec![PathSegment::field("blocks"), PathSegment::ArrayItems],
//!     discriminator: "type".into(),
//!     options: Vec::new(),
//! });
//! assert!(matches!(
//!     validate_collection(&collection)[0],
//!     ValidationError::UnionWithoutOptions(_)
//! ));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{CollectionSchema, DiscriminatedUnion, display_path};

/// Collection/set validation findings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Collection name is empty or whitespace-only.
    #[error("collection name cannot be empty")]
    EmptyCollectionName,
    /// A union declares an empty discriminator field name.
    #[error("discriminated union at {0} has an empty discriminator")]
    EmptyDiscriminator(String),
    /// Every option of a union was skipped.
    #[error("discriminated union at {0} has no usable options")]
    UnionWithoutOptions(String),
    /// Two options of one union share a discriminator value.
    #[error("discriminated union at {path} repeats block type {value}")]
    DuplicateBlockType { path: String, value: String },
    /// Two unions were recorded at the same path.
    #[error("more than one discriminated union recorded at {0}")]
    DuplicateUnionPath(String),
}

/// Validates one compiled collection.
pub fn validate_collection(collection: &CollectionSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if collection.name.trim().is_empty() {
        errors.push(ValidationError::EmptyCollectionName);
    }

    let mut seen_paths = HashSet::new();
    for union in &collection.discriminated_unions {
        let path = display_path(&union.path);
        if !seen_paths.insert(path.clone()) {
            errors.push(ValidationError::DuplicateUnionPath(path.clone()));
        }
        validate_union(union, &path, &mut errors);
    }

    errors
}

fn validate_union(union: &DiscriminatedUnion, path: &str, errors: &mut Vec<ValidationError>) {
    if union.discriminator.trim().is_empty() {
        errors.push(ValidationError::EmptyDiscriminator(path.to_string()));
    }
    if union.options.is_empty() {
        errors.push(ValidationError::UnionWithoutOptions(path.to_string()));
        return;
    }

    let mut seen = HashSet::new();
    for option in &union.options {
        let key = option.key();
        if !seen.insert(key.clone()) {
            errors.push(ValidationError::DuplicateBlockType {
                path: path.to_string(),
                value: key,
            });
        }
    }
}
