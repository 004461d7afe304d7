use hex::encode;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::fields::ExtractedFields;

pub struct Hash;

impl Hash {
    /// Deterministic JSON rendering: object keys sorted at every level,
    /// array order preserved, primitives as JSON literals.
    ///
    /// Two values produce the same string exactly when they are deep-equal
    /// once key order is ignored.
    pub fn canonicalize(value: &Value) -> String {
        let mut out = String::new();
        Self::write_canonical(value, &mut out);
        out
    }

    fn write_canonical(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                out.push('{');
                for (i, (key, val)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::from(key.as_str()).to_string());
                    out.push(':');
                    Self::write_canonical(val, out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    Self::write_canonical(item, out);
                }
                out.push(']');
            }
            primitive => out.push_str(&primitive.to_string()),
        }
    }

    pub fn compute_sha2_256_hash(data: &str) -> String {
        let digest = Sha256::digest(data.as_bytes());
        encode(digest)
    }

    /// Content hash of a field-set: SHA-256 over its canonical form.
    pub fn content_hash(fields: &ExtractedFields) -> String {
        Self::compute_sha2_256_hash(&Self::canonicalize(&fields.to_json()))
    }

    pub fn short_hash<'a>(hash: &Option<&'a str>) -> &'a str {
        match hash {
            Some(hash) => &hash[..hash.len().min(7)],
            None => "-",
        }
    }
}
