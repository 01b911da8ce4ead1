//! Per-rpcType argument parsing (spec.md §4.6 step 4).

use indexmap::IndexMap;
use serde_json::Value;

use tango_core::codec::{json_parse, unbase64url, unpack};
use tango_core::error::{Error, Result};
use tango_core::tree::value_to_args;
use tango_core::upload::FileUpload;

use crate::multipart;

/// `get`: every search parameter becomes a plain string value. Repeated keys
/// are last-wins — `IndexMap::insert` overwriting the prior value gives this
/// for free (spec.md §9 Open Question 1).
pub fn parse_get_args(query: &str) -> IndexMap<String, Value> {
    let mut args = IndexMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        args.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    args
}

/// `query`: the `args` search parameter, base64url-decoded and MessagePack-unpacked.
pub fn parse_query_args(query: &str) -> Result<IndexMap<String, Value>> {
    let raw = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "args")
        .map(|(_, value)| value.into_owned());

    match raw {
        Some(encoded) => {
            let bytes = unbase64url(&encoded)
                .map_err(|_| Error::BadRequest("Invalid base64url in args".to_string()))?;
            let value: Value = unpack(&bytes)
                .map_err(|_| Error::BadRequest("Invalid msgpackr body".to_string()))?;
            value_to_args(value)
        }
        None => Ok(IndexMap::new()),
    }
}

/// `command`: dispatched on `Content-Type` (spec.md §4.6 step 4, §4.6.1).
pub async fn parse_command_args(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<(IndexMap<String, Value>, IndexMap<String, Vec<FileUpload>>)> {
    let content_type = match content_type {
        Some(ct) => ct,
        None => return Err(Error::UnsupportedMediaType),
    };

    if content_type.contains("multipart/form-data") {
        return multipart::parse(content_type, body).await;
    }

    if content_type.contains("application/json") {
        if body.is_empty() {
            return Ok((IndexMap::new(), IndexMap::new()));
        }
        let text = std::str::from_utf8(body)
            .map_err(|_| Error::BadRequest("Invalid JSON body".to_string()))?;
        let value: Value =
            json_parse(text).map_err(|_| Error::BadRequest("Invalid JSON body".to_string()))?;
        return Ok((value_to_args(value)?, IndexMap::new()));
    }

    if content_type.contains("application/msgpack") {
        if body.is_empty() {
            return Ok((IndexMap::new(), IndexMap::new()));
        }
        let value: Value =
            unpack(body).map_err(|_| Error::BadRequest("Invalid msgpackr body".to_string()))?;
        return Ok((value_to_args(value)?, IndexMap::new()));
    }

    Err(Error::UnsupportedMediaType)
}
