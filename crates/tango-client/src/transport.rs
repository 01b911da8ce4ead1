//! The reqwest-backed transport: URL assembly, request shape selection,
//! abort/progress-aware dispatch, and response decoding (spec.md §4.8).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use tango_core::codec::{base64url, pack, unpack};
use tango_core::context::{ClientContext, Progress, ProgressPhase};
use tango_core::error::{Error, Result};
use tango_core::kebab::kebab_path;
use tango_core::tree::RpcType;

/// Bodies are chunked at this size so a progress callback sees incremental
/// `loaded` values instead of one jump straight to `total` (spec.md §4.8.5).
const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Performs the call described by `ctx` against `base_url`, storing the raw
/// response and decoded result on `ctx` (spec.md §4.8 steps 1, 3-7).
pub async fn send(http: &Client, base_url: &str, ctx: &mut ClientContext) -> Result<()> {
    if let Some(abort) = &ctx.abort {
        if abort.is_cancelled() {
            return Err(Error::Aborted);
        }
    }

    let url = format!("{}/{}", base_url.trim_end_matches('/'), kebab_path(ctx.path.iter()));
    let has_multipart_uploads = matches!(ctx.rpc_type, RpcType::Command) && !ctx.uploads.is_empty();
    let request = build_request(http, &url, ctx)?;

    // Multipart bodies are assembled by `reqwest::multipart::Form`, which
    // doesn't expose its internal stream for per-chunk instrumentation, so
    // uploads with files report only a start/complete pair rather than the
    // continuous per-chunk progress the plain command body gets below.
    if has_multipart_uploads {
        if let Some(callback) = &ctx.on_progress {
            let total = ctx.uploads.values().flat_map(|u| u.files()).map(|f| f.bytes.len() as u64).sum();
            callback(Progress::new(0, total, ProgressPhase::Upload));
        }
    }

    let response = match &ctx.abort {
        Some(abort) => {
            tokio::select! {
                biased;
                _ = abort.cancelled() => return Err(Error::Aborted),
                result = request.send() => result.map_err(|e| Error::Transport(e.to_string()))?,
            }
        }
        None => request.send().await.map_err(|e| Error::Transport(e.to_string()))?,
    };

    if has_multipart_uploads {
        if let Some(callback) = &ctx.on_progress {
            let total = ctx.uploads.values().flat_map(|u| u.files()).map(|f| f.bytes.len() as u64).sum();
            callback(Progress::new(total, total, ProgressPhase::Upload));
        }
    }

    let status = response.status();
    let headers = response.headers().clone();
    let total = response.content_length();
    let on_progress = ctx.on_progress.clone();
    let abort = ctx.abort.clone();

    let body = download_with_progress(response, total, on_progress, abort).await?;

    let http_headers = into_http_header_map(&headers);
    ctx.response = Some(tango_core::context::RawResponse {
        status: status.as_u16(),
        headers: http_headers,
        body: body.to_vec(),
    });

    ctx.result = Some(decode(status, &body)?);
    Ok(())
}

fn build_request(http: &Client, url: &str, ctx: &ClientContext) -> Result<reqwest::RequestBuilder> {
    let mut builder = match ctx.rpc_type {
        RpcType::Get => {
            let mut request = http.get(url);
            for (key, value) in &ctx.args {
                if value.is_null() {
                    continue;
                }
                request = request.query(&[(key.as_str(), coerce_to_string(value))]);
            }
            request
        }
        RpcType::Query => {
            let mut request = http.get(url);
            if !ctx.args.is_empty() {
                let value = Value::Object(ctx.args.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
                let packed = pack(&value)?;
                request = request.query(&[("args", base64url(&packed))]);
            }
            request
        }
        RpcType::Command if !ctx.uploads.is_empty() => build_multipart_request(http, url, ctx)?,
        RpcType::Command => {
            let value = Value::Object(ctx.args.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            let packed = pack(&value)?;
            let body = match &ctx.on_progress {
                Some(callback) => reqwest::Body::wrap_stream(chunked_upload_stream(packed, callback.clone())),
                None => reqwest::Body::from(packed),
            };
            http.post(url).header("content-type", "application/msgpack").body(body)
        }
    };

    for (name, value) in &ctx.request_headers {
        if let Ok(value_str) = value.to_str() {
            builder = builder.header(name.as_str(), value_str);
        }
    }

    Ok(builder)
}

fn build_multipart_request(http: &Client, url: &str, ctx: &ClientContext) -> Result<reqwest::RequestBuilder> {
    let args_value = Value::Object(ctx.args.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    let packed = pack(&args_value)?;

    let args_part = reqwest::multipart::Part::bytes(packed)
        .mime_str("application/msgpack")
        .map_err(|e| Error::Transport(e.to_string()))?;
    let mut form = reqwest::multipart::Form::new().part("args", args_part);

    for (name, upload) in &ctx.uploads {
        let field_name = if upload.is_list() {
            format!("{name}[]")
        } else {
            name.clone()
        };
        for file in upload.files() {
            let mut part = reqwest::multipart::Part::bytes(file.bytes.to_vec()).file_name(file.filename.clone());
            if let Some(ct) = &file.content_type {
                part = part.mime_str(ct).map_err(|e| Error::Transport(e.to_string()))?;
            }
            form = form.part(field_name.clone(), part);
        }
    }

    Ok(http.post(url).multipart(form))
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Splits a fully-buffered body into fixed-size chunks and reports `Upload`
/// progress as `reqwest` polls the stream for each one (spec.md §4.8.5). The
/// whole body is already in memory — chunking exists purely to give the
/// caller incremental `loaded` values instead of one jump to `total`.
fn chunked_upload_stream(
    bytes: Vec<u8>,
    on_progress: Arc<dyn Fn(Progress) + Send + Sync>,
) -> impl futures::Stream<Item = std::result::Result<Bytes, std::io::Error>> {
    let total = bytes.len() as u64;
    let chunks: Vec<Bytes> = if bytes.is_empty() {
        vec![Bytes::new()]
    } else {
        bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(Bytes::copy_from_slice)
            .collect()
    };
    let loaded = Arc::new(AtomicU64::new(0));

    stream::iter(chunks).map(move |chunk| {
        let so_far = loaded.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
        on_progress(Progress::new(so_far, total, ProgressPhase::Upload));
        Ok(chunk)
    })
}

async fn download_with_progress(
    response: reqwest::Response,
    total: Option<u64>,
    on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
    abort: Option<tokio_util::sync::CancellationToken>,
) -> Result<Bytes> {
    let Some(callback) = on_progress else {
        return match abort {
            Some(abort) => {
                tokio::select! {
                    biased;
                    _ = abort.cancelled() => Err(Error::Aborted),
                    body = response.bytes() => body.map_err(|e| Error::Transport(e.to_string())),
                }
            }
            None => response.bytes().await.map_err(|e| Error::Transport(e.to_string())),
        };
    };

    let total = total.unwrap_or(0);
    let loaded = AtomicU64::new(0);
    let mut stream = response.bytes_stream();
    let mut buffer = Vec::new();

    loop {
        let next = match &abort {
            Some(abort) => {
                tokio::select! {
                    biased;
                    _ = abort.cancelled() => return Err(Error::Aborted),
                    chunk = stream.next() => chunk,
                }
            }
            None => stream.next().await,
        };

        match next {
            Some(Ok(chunk)) => {
                let so_far = loaded.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
                buffer.extend_from_slice(&chunk);
                callback(Progress::new(so_far, total, ProgressPhase::Download));
            }
            Some(Err(e)) => return Err(Error::Transport(e.to_string())),
            None => break,
        }
    }

    Ok(Bytes::from(buffer))
}

fn into_http_header_map(headers: &reqwest::header::HeaderMap) -> http::HeaderMap {
    let mut out = http::HeaderMap::new();
    for (name, value) in headers {
        if let Ok(http_name) = http::HeaderName::from_bytes(name.as_str().as_bytes()) {
            if let Ok(http_value) = http::HeaderValue::from_bytes(value.as_bytes()) {
                out.append(http_name, http_value);
            }
        }
    }
    out
}

/// Response decoding rules (spec.md §4.8 step 6).
fn decode(status: StatusCode, body: &[u8]) -> Result<Value> {
    if body.is_empty() {
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        if !status.is_success() {
            return Err(Error::ServerError {
                status: status.as_u16(),
                body: None,
            });
        }
        return Err(Error::UnexpectedEmptyResponse);
    }

    let value: Value = unpack(body)?;

    if !status.is_success() {
        return Err(Error::ServerError {
            status: status.as_u16(),
            body: Some(value),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunked_upload_stream_reports_monotonic_totals() {
        let seen: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let callback: Arc<dyn Fn(Progress) + Send + Sync> =
            Arc::new(move |p: Progress| seen2.lock().unwrap().push(p.loaded));

        let bytes = vec![0u8; UPLOAD_CHUNK_SIZE * 3 + 1];
        let total = bytes.len() as u64;
        let chunks: Vec<_> = chunked_upload_stream(bytes, callback).collect().await;

        assert_eq!(chunks.iter().map(|c| c.as_ref().unwrap().len() as u64).sum::<u64>(), total);
        let loaded = seen.lock().unwrap();
        assert_eq!(*loaded.last().unwrap(), total);
        for pair in loaded.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn decode_empty_body_204_is_null() {
        let value = decode(StatusCode::NO_CONTENT, b"").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn decode_empty_body_non_ok_is_server_error() {
        let err = decode(StatusCode::INTERNAL_SERVER_ERROR, b"").unwrap_err();
        assert!(matches!(err, Error::ServerError { status: 500, body: None }));
    }

    #[test]
    fn decode_empty_body_ok_is_unexpected_empty_response() {
        let err = decode(StatusCode::OK, b"").unwrap_err();
        assert!(matches!(err, Error::UnexpectedEmptyResponse));
    }

    #[test]
    fn decode_non_empty_failure_carries_decoded_body() {
        let packed = pack(&serde_json::json!([{"path": ["title"], "message": "too short"}])).unwrap();
        let err = decode(StatusCode::UNPROCESSABLE_ENTITY, &packed).unwrap_err();
        match err {
            Error::ServerError { status: 422, body: Some(value) } => {
                assert_eq!(value[0]["message"], "too short");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decode_success_unpacks_value() {
        let packed = pack(&serde_json::json!({"message": "hi"})).unwrap();
        let value = decode(StatusCode::OK, &packed).unwrap();
        assert_eq!(value["message"], "hi");
    }

    #[tokio::test]
    async fn query_call_sends_base64url_packed_args_and_msgpack_accept() {
        use wiremock::matchers::{header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let expected_args = base64url(&pack(&serde_json::json!({"page": 2})).unwrap());
        let response_body = pack(&serde_json::json!({"items": []})).unwrap();

        Mock::given(method("GET"))
            .and(path("/users.list"))
            .and(query_param("args", expected_args))
            .and(header("accept", "application/msgpack"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(response_body))
            .mount(&server)
            .await;

        let mut args = indexmap::IndexMap::new();
        args.insert("page".to_string(), Value::from(2));
        let mut ctx = ClientContext::new(vec!["users".to_string(), "list".to_string()], args, RpcType::Query);

        send(&Client::new(), &server.uri(), &mut ctx).await.unwrap();

        assert_eq!(ctx.result.unwrap()["items"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn server_error_status_is_surfaced_with_decoded_body() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = pack(&serde_json::json!([{"path": ["title"], "message": "too short"}])).unwrap();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_bytes(body))
            .mount(&server)
            .await;

        let mut ctx = ClientContext::new(vec!["posts".to_string(), "create".to_string()], indexmap::IndexMap::new(), RpcType::Command);
        let err = send(&Client::new(), &server.uri(), &mut ctx).await.unwrap_err();

        match err {
            Error::ServerError { status: 422, body: Some(value) } => assert_eq!(value[0]["message"], "too short"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
