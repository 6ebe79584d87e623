//! Deterministic naming for parameters and query aliases.
//!
//! Names are derived from content (SHA-256), never from object identity or
//! registration order, so compiling the same table twice yields
//! byte-identical SQL.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Parameter name for a literal of the given kind.
///
/// The same literal always maps to the same name, so registering it twice
/// in one statement is harmless.
pub fn param_name(kind: &str, value: &str) -> String {
    let mut input = Vec::with_capacity(kind.len() + value.len() + 1);
    input.extend_from_slice(kind.as_bytes());
    input.push(0);
    input.extend_from_slice(value.as_bytes());
    format!("{}_{}", kind, &content_hash(&input)[..10])
}

/// SQL alias from a canonical serialization of a query's shape.
pub fn shape_alias(canonical: &[u8]) -> String {
    format!("q_{}", &content_hash(canonical)[..12])
}
