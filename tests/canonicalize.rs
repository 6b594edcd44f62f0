//! Canonicalization reference vectors
//!
//! The unit tests in `payments::canonical` cover the field-level rules;
//! these pin the end-to-end hash contract against independently computed
//! reference values.

use serde_json::{json, Map, Value};

use tally::payments::canonical::{concat_canonical, pipe_canonical, secure_hash};

const SALT: &str = "by8u28y09v";

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().expect("fixture must be an object").clone()
}

fn hmac_sha256_hex(key: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn secure_hash_matches_reference_hmac() {
    let payload = fields(json!({"a": "1", "b": "two", "c": "three"}));
    let expected = hmac_sha256_hex(SALT, "1|two|three");
    assert_eq!(secure_hash(&payload, &[], Some(SALT)), expected);
}

#[test]
fn pipe_canonical_is_insertion_order_independent() {
    let mut forward = Map::new();
    forward.insert("a".into(), json!("1"));
    forward.insert("b".into(), json!("two"));
    forward.insert("c".into(), json!("three"));

    let mut reverse = Map::new();
    reverse.insert("c".into(), json!("three"));
    reverse.insert("b".into(), json!("two"));
    reverse.insert("a".into(), json!("1"));

    assert_eq!(pipe_canonical(&forward, &[]), pipe_canonical(&reverse, &[]));
    assert_eq!(
        secure_hash(&forward, &[], Some(SALT)),
        secure_hash(&reverse, &[], Some(SALT))
    );
}

#[test]
fn concat_canonical_has_no_separator() {
    let payload = fields(json!({"b": "two", "a": "1", "c": "three"}));
    assert_eq!(concat_canonical(&payload, &[]), "1twothree");
}

#[test]
fn number_and_bool_values_stringify_verbatim() {
    let payload = fields(json!({"a": 10, "b": true, "c": 1.5}));
    assert_eq!(pipe_canonical(&payload, &[]), "10|true|1.5");
}

#[test]
fn single_character_change_invalidates_hash() {
    let original = fields(json!({"amount": "5000", "tx": "T1"}));
    let tampered = fields(json!({"amount": "5001", "tx": "T1"}));
    assert_ne!(
        secure_hash(&original, &[], Some(SALT)),
        secure_hash(&tampered, &[], Some(SALT))
    );
}
