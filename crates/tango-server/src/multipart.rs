//! Multipart form parsing for `command` endpoints (spec.md §4.6.1).
//!
//! Form entries split into the special field `args` and all others. A key with
//! a `[]` suffix collects every value under that key as an ordered sequence;
//! any other repeated key keeps its first occurrence. File parts are kept as
//! [`FileUpload`]s, stashed in a sibling map rather than mixed into the plain
//! JSON args value — `serde_json::Value` has no file-handle variant, so Tango
//! threads uploads through [`tango_core::context::ServerContext::uploads`]
//! instead of literally inlining them into `args` the way the dynamically
//! typed source does (see DESIGN.md).

use bytes::Bytes;
use futures::stream;
use indexmap::IndexMap;
use serde_json::Value;

use tango_core::codec::json_parse;
use tango_core::codec::unpack;
use tango_core::error::{Error, Result};
use tango_core::tree::value_to_args;
use tango_core::upload::FileUpload;

pub async fn parse(
    content_type: &str,
    body: &[u8],
) -> Result<(IndexMap<String, Value>, IndexMap<String, Vec<FileUpload>>)> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| Error::BadRequest(format!("Invalid multipart boundary: {e}")))?;

    let chunk = Bytes::copy_from_slice(body);
    let body_stream = stream::once(async move { Ok::<Bytes, std::io::Error>(chunk) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    let mut args: IndexMap<String, Value> = IndexMap::new();
    let mut list_fields: IndexMap<String, Vec<Value>> = IndexMap::new();
    let mut uploads: IndexMap<String, Vec<FileUpload>> = IndexMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = match field.name() {
            Some(n) => n.to_string(),
            None => continue,
        };

        if name == "args" {
            let subtype = field.content_type().map(|m| m.essence_str().to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::BadRequest(format!("Invalid args blob: {e}")))?;

            let parsed = match subtype.as_deref() {
                Some("application/json") => {
                    let text = std::str::from_utf8(&bytes).map_err(|_| {
                        Error::BadRequest("Invalid JSON in args blob".to_string())
                    })?;
                    json_parse::<Value>(text)
                        .map_err(|_| Error::BadRequest("Invalid JSON in args blob".to_string()))?
                }
                Some("application/msgpack") => unpack::<Value>(&bytes).map_err(|_| {
                    Error::BadRequest("Invalid msgpackr in args blob".to_string())
                })?,
                Some(other) => {
                    return Err(Error::BadRequest(format!("Unsupported args type: {other}")))
                }
                None => {
                    return Err(Error::BadRequest(
                        "Unsupported args type: (none)".to_string(),
                    ))
                }
            };

            for (key, value) in value_to_args(parsed)? {
                args.insert(key, value);
            }
            continue;
        }

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(|m| m.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::BadRequest(format!("Invalid file field: {e}")))?;
            let mut upload = FileUpload::new(file_name, bytes);
            if let Some(ct) = content_type {
                upload = upload.with_content_type(ct);
            }
            let key = name.strip_suffix("[]").unwrap_or(&name).to_string();
            uploads.entry(key).or_default().push(upload);
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Invalid field: {e}")))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        if let Some(base) = name.strip_suffix("[]") {
            list_fields
                .entry(base.to_string())
                .or_default()
                .push(Value::String(text));
        } else {
            args.entry(name).or_insert(Value::String(text));
        }
    }

    for (key, values) in list_fields {
        args.insert(key, Value::Array(values));
    }

    Ok((args, uploads))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tango_core::codec::pack;

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content_type, bytes) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{name}\"");
            if let Some(fname) = filename {
                disposition.push_str(&format!("; filename=\"{fname}\""));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(ct) = content_type {
                body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    #[tokio::test]
    async fn parses_msgpack_args_plus_scalar_field() {
        let boundary = "X-BOUNDARY";
        let packed = pack(&serde_json::json!({"note": "x"})).unwrap();
        let body = multipart_body(
            boundary,
            &[
                ("args", None, Some("application/msgpack"), &packed),
                ("extra", None, None, b"hi"),
            ],
        );

        let (args, uploads) = parse(
            &format!("multipart/form-data; boundary={boundary}"),
            &body,
        )
        .await
        .unwrap();

        assert_eq!(args.get("note").unwrap(), "x");
        assert_eq!(args.get("extra").unwrap(), "hi");
        assert!(uploads.is_empty());
    }

    #[tokio::test]
    async fn list_suffixed_field_collects_all_values() {
        let boundary = "X-BOUNDARY";
        let body = multipart_body(
            boundary,
            &[
                ("tags[]", None, None, b"a"),
                ("tags[]", None, None, b"b"),
            ],
        );

        let (args, _uploads) = parse(
            &format!("multipart/form-data; boundary={boundary}"),
            &body,
        )
        .await
        .unwrap();

        assert_eq!(
            args.get("tags").unwrap(),
            &Value::Array(vec![Value::String("a".into()), Value::String("b".into())])
        );
    }

    #[tokio::test]
    async fn file_parts_become_uploads_keyed_without_list_suffix() {
        let boundary = "X-BOUNDARY";
        let body = multipart_body(
            boundary,
            &[
                ("files[]", Some("f1.txt"), Some("text/plain"), b"one"),
                ("files[]", Some("f2.txt"), Some("text/plain"), b"two"),
            ],
        );

        let (args, uploads) = parse(
            &format!("multipart/form-data; boundary={boundary}"),
            &body,
        )
        .await
        .unwrap();

        assert!(args.is_empty());
        let files = uploads.get("files").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "f1.txt");
        assert_eq!(files[1].filename, "f2.txt");
    }

    #[tokio::test]
    async fn repeated_non_list_key_keeps_first_occurrence() {
        let boundary = "X-BOUNDARY";
        let body = multipart_body(
            boundary,
            &[("note", None, None, b"first"), ("note", None, None, b"second")],
        );

        let (args, _uploads) = parse(
            &format!("multipart/form-data; boundary={boundary}"),
            &body,
        )
        .await
        .unwrap();

        assert_eq!(args.get("note").unwrap(), "first");
    }
}
