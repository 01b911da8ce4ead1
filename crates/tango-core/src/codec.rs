//! Symmetric MessagePack pack/unpack, base64url encoding, JSON fallback.
//!
//! Both the server dispatcher and the client transport route every argument and
//! result value through this module so that the two sides never drift apart on wire
//! format.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Packs a value into MessagePack bytes.
pub fn pack<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(Error::MsgPackEncode)
}

/// Unpacks MessagePack bytes into a value.
pub fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(Error::MsgPackDecode)
}

/// URL-safe base64 without padding.
pub fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes URL-safe base64 without padding.
pub fn unbase64url(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(s).map_err(Error::Base64)
}

/// JSON fallback, used when the `Accept`/`Content-Type` negotiation picks JSON.
pub fn json_encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Error::Serialization)
}

pub fn json_parse<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(Error::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| Value::Number(n.into())),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..8)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn msgpack_round_trip(v in arb_json()) {
            let bytes = pack(&v).unwrap();
            let back: Value = unpack(&bytes).unwrap();
            prop_assert_eq!(v, back);
        }

        #[test]
        fn base64url_round_trip(b in prop::collection::vec(any::<u8>(), 0..256)) {
            let encoded = base64url(&b);
            let decoded = unbase64url(&encoded).unwrap();
            prop_assert_eq!(b, decoded);
        }
    }

    #[test]
    fn base64url_has_no_padding_and_is_url_safe() {
        let encoded = base64url(&[0xff, 0xee, 0xdd, 0xcc, 0xbb]);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn json_fallback_round_trip() {
        let v = serde_json::json!({"a": 1, "b": [1,2,3]});
        let s = json_encode(&v).unwrap();
        let back: Value = json_parse(&s).unwrap();
        assert_eq!(v, back);
    }
}
