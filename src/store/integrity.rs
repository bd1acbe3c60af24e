//! Tamper-evident envelope around persisted state.
//!
//! The protection tag is a keyed BLAKE3 hash over a canonical, recursively
//! key-sorted serialization of the payload (the tag itself excluded), so the
//! tag is stable across serializer field-ordering differences. The key is a
//! per-installation secret, never hard-coded.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTECTION: &str = "keyed-blake3";

#[derive(Serialize, Deserialize)]
struct Envelope {
    protection: String,
    integrity: String,
    payload: Value,
}

/// Wrap `payload` in an integrity envelope, serialized for atomic write.
pub fn seal<T: Serialize>(payload: &T, key: &[u8; 32]) -> Result<Vec<u8>> {
    let value = serde_json::to_value(payload).context("serialize payload")?;
    let envelope = Envelope {
        protection: PROTECTION.to_string(),
        integrity: tag_for(&value, key),
        payload: value,
    };
    let mut out = serde_json::to_vec_pretty(&envelope).context("serialize envelope")?;
    out.push(b'\n');
    Ok(out)
}

/// Verify and unwrap an envelope. Any mismatch (unknown scheme, bad tag,
/// malformed JSON) is an error; callers treat it as "record absent".
pub fn open<T: DeserializeOwned>(bytes: &[u8], key: &[u8; 32]) -> Result<T> {
    let envelope: Envelope = serde_json::from_slice(bytes).context("parse envelope")?;
    if envelope.protection != PROTECTION {
        bail!("unknown protection scheme '{}'", envelope.protection);
    }

    let expected = blake3::keyed_hash(key, canonical(&envelope.payload).as_bytes());
    let stored = match blake3::Hash::from_hex(&envelope.integrity) {
        Ok(h) => h,
        Err(_) => bail!("malformed integrity tag"),
    };
    // Hash equality is constant-time.
    if stored != expected {
        bail!("integrity tag mismatch");
    }

    serde_json::from_value(envelope.payload).context("decode payload")
}

fn tag_for(value: &Value, key: &[u8; 32]) -> String {
    blake3::keyed_hash(key, canonical(value).as_bytes())
        .to_hex()
        .to_string()
}

fn canonical(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(k.as_str()).to_string());
                out.push(':');
                if let Some(v) = map.get(k.as_str()) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}
