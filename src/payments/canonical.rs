//! Signature canonicalization.
//!
//! Each provider signs an exact byte string derived from the payload
//! fields. The rules here are provider-contract-defined: a one-character
//! deviation invalidates every signature, so they must not be simplified.
//! Where the upstream provider documentation is ambiguous, the rule below
//! is the one the rest of this codebase (and its test vectors) relies on;
//! confirm against current provider docs before changing it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Stringify a JSON value the way providers do when building the signed
/// string: scalars verbatim, arrays joined by comma, objects JSON-serialized,
/// null mapped to the empty string.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn sorted_values(fields: &Map<String, Value>, exclude: &[&str]) -> Vec<String> {
    // serde_json::Map iterates in key order, but sort explicitly so the
    // contract does not depend on the map implementation.
    let mut keys: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|k| !exclude.contains(k))
        .collect();
    keys.sort_unstable();
    keys.into_iter()
        .map(|k| stringify(&fields[k]))
        .collect()
}

/// HMAC-scheme canonical string (JazzCash, EasyPaisa): values in sorted-key
/// order, nulls as empty strings, joined by `"|"`.
pub fn pipe_canonical(fields: &Map<String, Value>, exclude: &[&str]) -> String {
    sorted_values(fields, exclude).join("|")
}

/// RSA-scheme canonical string (Paddle): values in sorted-key order,
/// concatenated with no separator.
pub fn concat_canonical(fields: &Map<String, Value>, exclude: &[&str]) -> String {
    sorted_values(fields, exclude).join("")
}

/// Compute the secure hash over the pipe-canonical string.
///
/// With a salt this is `HMAC-SHA256(salt, canonical)` as lowercase hex.
/// Without one it degrades to plain `SHA256(canonical)` hex - only valid
/// for providers with no keyed-HMAC requirement; it is a fallback, not a
/// security control.
pub fn secure_hash(fields: &Map<String, Value>, exclude: &[&str], salt: Option<&str>) -> String {
    let canonical = pipe_canonical(fields, exclude);
    match salt {
        Some(salt) => {
            let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
                .expect("HMAC-SHA256 accepts keys of any length");
            mac.update(canonical.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        None => hex::encode(Sha256::digest(canonical.as_bytes())),
    }
}

/// Verify an RSA PKCS#1 v1.5 / SHA-1 signature over `message`.
///
/// The incoming signature is base64; a malformed signature is a mismatch,
/// not an error. An unparseable public key is a configuration fault and is
/// surfaced as one.
pub fn verify_rsa_sha1(public_key_pem: &str, message: &[u8], signature_b64: &str) -> Result<bool> {
    let key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_key_pem))
        .map_err(|e| {
            AppError::ConfigurationMissing(format!("unparseable RSA public key: {}", e))
        })?;

    let Ok(signature) = BASE64.decode(signature_b64.trim()) else {
        return Ok(false);
    };

    let digest = Sha1::digest(message);
    Ok(key
        .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
        .is_ok())
}
