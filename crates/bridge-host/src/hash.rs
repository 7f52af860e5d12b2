use std::collections::BTreeMap;

use bridge_core::BridgeError;
use sha2::{Digest, Sha256};

use crate::manifest::MethodSignature;
use crate::serde::to_canonical_json_bytes;

/// Hex SHA-256 of the canonical JSON form of a method table.
///
/// Hosts compare it against the fingerprint baked into generated call stubs
/// to detect stubs built against a different table.
pub fn method_table_fingerprint(
    table: &BTreeMap<String, MethodSignature>,
) -> Result<String, BridgeError> {
    let bytes = to_canonical_json_bytes(table)?;
    Ok(hex::encode(Sha256::digest(bytes)))
}
