//! Content-declaration shim.
//!
//! Substituted at bundle time for the host framework's virtual content
//! module. It keeps only the surface a schema-definition module needs at
//! evaluation time.

/// Builds the shim module source for `validation_library`.
///
/// The shim re-exports the library, makes `defineCollection` the identity,
/// and turns `reference(name)` into a plain tag object the runtime reports as
/// a reference node.
///
/// # Examples
///
/// ```
/// let src = collection_schema_engine::shim::shim_source("zod");
/// assert!(src.contains(r#"export { z } from "zod";"#));
/// assert!(src.contains("defineCollection"));
/// ```
pub fn shim_source(validation_library: &str) -> String {
    let library = serde_json::Value::String(validation_library.to_string());
    format!(
        r#"export {{ z }} from {library};
export * from {library};
export const defineCollection = (config) => config;
export const reference = (collection) => ({{ _type: "reference", collection }});
"#
    )
}
