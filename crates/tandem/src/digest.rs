//! Content digests: event fingerprints and state digests.
//!
//! Both are lowercase hex SHA-256 over canonical JSON: compact, with object
//! keys sorted at every depth. Two payloads that are equal as JSON hash the
//! same regardless of field order, including when another crate in the build
//! enables `serde_json/preserve_order`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::Event;
use crate::error::TandemError;

/// Content-addressed identity of a `(dispatcher, event)` pair.
///
/// Used to pair a confirmed event with the optimistic entry that predicted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of `event` as dispatched by `dispatcher`.
    ///
    /// Fields are length-prefixed so no two distinct inputs share a byte
    /// stream. An absent payload and a JSON `null` payload hash differently.
    pub fn of(dispatcher: &str, event: &Event) -> Self {
        let mut hasher = Sha256::new();
        update_framed(&mut hasher, dispatcher.as_bytes());
        update_framed(&mut hasher, event.type_tag.as_bytes());
        match &event.payload {
            Some(payload) => {
                hasher.update([1u8]);
                update_framed(&mut hasher, canonical_json(payload).as_bytes());
            }
            None => hasher.update([0u8]),
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell entries apart in logs
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Digest of a full state snapshot, exchanged to detect divergence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDigest(String);

impl StateDigest {
    /// Digest the canonical JSON serialization of `state`.
    ///
    /// Map fields hash the same whatever their iteration order.
    pub fn of<S: Serialize>(state: &S) -> Result<Self, TandemError> {
        let value = serde_json::to_value(state)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(&value).as_bytes());
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Wrap a digest received from elsewhere.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON with object keys sorted recursively.
fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Value's Display escapes the key as a JSON string
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
