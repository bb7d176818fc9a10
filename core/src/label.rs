//! Human-readable labels for block types.

use serde_json::Value;

use crate::types::literal_key;

/// Turns a camelCase discriminator value into a display label.
///
/// A space is inserted before every uppercase letter that is not the first
/// character, then the first character is uppercased.
///
/// # Examples
///
/// ```
/// use collection_schema_core::humanize_label;
///
/// assert_eq!(humanize_label("heroBlock"), "Hero Block");
/// assert_eq!(humanize_label("richText"), "Rich Text");
/// assert_eq!(humanize_label("cta"), "Cta");
/// ```
pub fn humanize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for (idx, ch) in raw.chars().enumerate() {
        if idx == 0 {
            out.extend(ch.to_uppercase());
            continue;
        }
        if ch.is_uppercase() {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

/// Label for an arbitrary literal value.
pub fn label_for_literal(value: &Value) -> String {
    humanize_label(&literal_key(value))
}
