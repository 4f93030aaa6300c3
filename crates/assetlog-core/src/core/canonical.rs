// crates/assetlog-core/src/core/canonical.rs
// ============================================================================
// Module: Assetlog Canonicalizer
// Description: Deterministic JSON and secret-map normalization.
// Purpose: Answer "did this actually change" independent of key order and whitespace.
// Dependencies: serde_json, serde_jcs
// ============================================================================

//! ## Overview
//! Settings blobs arrive as raw bytes from the host. They are compared in
//! RFC 8785 (JCS) canonical form so that key order, insignificant whitespace,
//! and number spelling (`1` vs `1.0`) never register as a change.
//!
//! Every function here is total: malformed JSON is passed through as trimmed
//! bytes so comparisons still terminate byte-for-byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Returns the canonical byte form of a JSON blob.
///
/// Blank input yields an empty vector. Unparseable input yields the trimmed
/// original bytes unchanged.
#[must_use]
pub fn canonicalize_json(blob: &[u8]) -> Vec<u8> {
    let trimmed = blob.trim_ascii();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_slice::<Value>(trimmed) {
        Ok(value) => serde_jcs::to_vec(&value).unwrap_or_else(|_| trimmed.to_vec()),
        Err(_) => trimmed.to_vec(),
    }
}

/// Structural JSON equality with a trimmed-bytes fallback.
///
/// Both sides blank compare equal. If `a` does not parse, the trimmed bytes
/// are compared; if only `b` fails to parse the blobs differ.
#[must_use]
pub fn json_equal(a: &[u8], b: &[u8]) -> bool {
    let left = a.trim_ascii();
    let right = b.trim_ascii();
    if left.is_empty() && right.is_empty() {
        return true;
    }
    let Ok(left_value) = serde_json::from_slice::<Value>(left) else {
        return left == right;
    };
    let Ok(right_value) = serde_json::from_slice::<Value>(right) else {
        return false;
    };
    match (serde_jcs::to_vec(&left_value), serde_jcs::to_vec(&right_value)) {
        (Ok(left_bytes), Ok(right_bytes)) => left_bytes == right_bytes,
        _ => left_value == right_value,
    }
}

/// Returns true when a JSON blob carries no settings.
///
/// Blank text, `null`, and `{}` are all considered blank.
#[must_use]
pub fn json_is_blank(blob: &[u8]) -> bool {
    let trimmed = blob.trim_ascii();
    if trimmed.is_empty() {
        return true;
    }
    match serde_json::from_slice::<Value>(trimmed) {
        Ok(Value::Null) => true,
        Ok(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}

/// Map equality where an absent map equals an empty one.
#[must_use]
pub fn maps_equal(a: Option<&BTreeMap<String, String>>, b: Option<&BTreeMap<String, String>>) -> bool {
    let empty = BTreeMap::new();
    a.unwrap_or(&empty) == b.unwrap_or(&empty)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
