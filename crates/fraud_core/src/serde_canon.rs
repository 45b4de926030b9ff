//! Canonical JSON serialization and content hashing
//!
//! Artifact files are written with recursively sorted object keys and stable
//! formatting, so identical content always produces identical bytes and
//! therefore identical blake3 digests.

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer, Value};
use std::collections::BTreeMap;

/// Canonicalize a JSON value by sorting all object keys recursively
fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}

/// Serialize a value to canonical, two-space indented JSON bytes
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let canonical = canonicalize_value(serde_json::to_value(value)?);
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    canonical.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Blake3 digest of raw bytes as a hex string
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestStruct {
        b_field: i64,
        a_field: i64,
        z_field: String,
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let data = TestStruct {
            b_field: 2,
            a_field: 1,
            z_field: "test".to_string(),
        };

        let json = String::from_utf8(to_canonical_json(&data).unwrap()).unwrap();
        let a_pos = json.find("a_field").unwrap();
        let b_pos = json.find("b_field").unwrap();
        let z_pos = json.find("z_field").unwrap();

        assert!(a_pos < b_pos);
        assert!(b_pos < z_pos);
    }

    #[test]
    fn test_hash_is_stable() {
        let h1 = hash_hex(b"schema");
        let h2 = hash_hex(b"schema");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_hex(b"schema "));
    }

    #[test]
    fn test_floats_round_trip_exactly() {
        let values = vec![0.1_f64, 1.0 / 3.0, -2.2250738585072014e-308, 1e300];
        let bytes = to_canonical_json(&values).unwrap();
        let back: Vec<f64> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(values, back);
    }
}
