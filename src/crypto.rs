//! Cipher detection.
//!
//! Folio never decrypts anything. It only needs to tell an encrypted payload
//! apart from a plaintext one without looking inside it.

use serde_json::Value;

/// Whether `value` has the shape of an encrypted payload.
///
/// A cipher is an object carrying string `iv` and `cipher` members. The
/// predicate is structural: it does not validate the encoding of either
/// member.
#[must_use]
pub fn is_cipher(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    matches!(map.get("iv"), Some(Value::String(_)))
        && matches!(map.get("cipher"), Some(Value::String(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cipher_shape() {
        assert!(is_cipher(&json!({ "iv": "a", "cipher": "b", "salt": "c" })));
    }

    #[test]
    fn test_not_cipher() {
        assert!(!is_cipher(&json!("<p>plain</p>")));
        assert!(!is_cipher(&json!({ "iv": "a" })));
        assert!(!is_cipher(&json!({ "iv": 1, "cipher": "b" })));
        assert!(!is_cipher(&json!(null)));
    }
}
