//! The per-request contract (spec.md §4.6): method gate, route lookup,
//! method/rpcType compatibility, argument parsing, execution, response
//! serialization. `handle` never propagates an error to its caller — every
//! failure mode this module knows about is turned into a [`DispatchResponse`]
//! here, the way `pforge_runtime`'s MCP dispatcher turns every `PforgeError`
//! into a protocol-level response rather than letting it escape the request
//! loop.

use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;

use tango_core::codec::{json_encode, pack};
use tango_core::context::ServerContext;
use tango_core::error::Error;
use tango_core::flatten::Api;
use tango_core::tree::RpcType;

use crate::adapter::{Adapter, DispatchResponse};
use crate::args::{parse_command_args, parse_get_args, parse_query_args};

pub async fn handle(api: &Api, adapter: &dyn Adapter) -> DispatchResponse {
    let method = adapter.method().clone();
    if method != Method::GET && method != Method::POST {
        return text_error(StatusCode::METHOD_NOT_ALLOWED, &Error::MethodNotAllowed.to_string());
    }

    let entry = match api.table().get(adapter.route()) {
        Some(entry) => entry,
        None => return text_error(StatusCode::NOT_FOUND, &Error::RouteNotFound.to_string()),
    };

    let compatible = matches!(
        (&method, entry.rpc_type),
        (&Method::GET, RpcType::Query) | (&Method::GET, RpcType::Get) | (&Method::POST, RpcType::Command)
    );
    if !compatible {
        let mismatch = Error::RpcTypeMismatch {
            method: method.to_string(),
            rpc_type: entry.rpc_type.as_str().to_string(),
        };
        return text_error(StatusCode::METHOD_NOT_ALLOWED, &mismatch.to_string());
    }

    let (args, uploads): (IndexMap<String, Value>, IndexMap<String, Vec<tango_core::upload::FileUpload>>) =
        match entry.rpc_type {
            RpcType::Get => (parse_get_args(adapter.query()), IndexMap::new()),
            RpcType::Query => match parse_query_args(adapter.query()) {
                Ok(args) => (args, IndexMap::new()),
                Err(err) => return parse_error_response(err),
            },
            RpcType::Command => {
                let content_type = adapter.header("content-type");
                match parse_command_args(content_type, adapter.body()).await {
                    Ok(result) => result,
                    Err(err) => return parse_error_response(err),
                }
            }
        };

    let mut ctx = ServerContext::with_event(args, adapter.headers().clone(), adapter.adapter_context());
    ctx.set_uploads(uploads);

    match entry.run(&mut ctx).await {
        Ok(value) => {
            let status = ctx.status_code();
            serialize_response(adapter, &ctx, status, value)
        }
        Err(Error::Validation(issues)) => {
            ctx.set_cache_seconds(0.0);
            let body = serde_json::to_value(&issues).unwrap_or(Value::Null);
            let mut response = serialize_response(adapter, &ctx, StatusCode::UNPROCESSABLE_ENTITY, body);
            response
                .headers
                .push(("X-Tango-Validation-Error".to_string(), "true".to_string()));
            response
        }
        Err(other) => {
            eprintln!("tango: unhandled error dispatching {}: {other}", adapter.route());
            DispatchResponse::empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Maps argument-parsing failures to their HTTP status (spec.md §4.6 step 4):
/// content-type gate failures are 415, malformed bodies are 400, anything else
/// this crate didn't anticipate is a 500 rather than a silent miscategorization.
fn parse_error_response(err: Error) -> DispatchResponse {
    match &err {
        Error::UnsupportedMediaType => text_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, &err.to_string()),
        Error::BadRequest(_) => text_error(StatusCode::BAD_REQUEST, &err.to_string()),
        _ => {
            eprintln!("tango: unexpected error parsing arguments: {err}");
            DispatchResponse::empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn text_error(status: StatusCode, message: &str) -> DispatchResponse {
    DispatchResponse::plain(status, message)
}

/// Content negotiation plus the always-present `X-Tango-Execution-Time` and the
/// conditional `Cache-Control` (spec.md §4.6.2).
fn serialize_response(adapter: &dyn Adapter, ctx: &ServerContext, status: StatusCode, value: Value) -> DispatchResponse {
    let accept = adapter.header("accept").unwrap_or("");
    let as_json = accept.contains("application/json");

    let (content_type, body) = if as_json {
        let text = json_encode(&value).unwrap_or_else(|_| "null".to_string());
        ("application/json", text.into_bytes())
    } else {
        let bytes = pack(&value).unwrap_or_default();
        ("application/msgpack", bytes)
    };

    let mut headers = vec![
        ("Content-Type".to_string(), content_type.to_string()),
        ("X-Tango-Execution-Time".to_string(), format!("{}", ctx.elapsed_ms())),
    ];

    if adapter.method() == Method::GET && ctx.cache_seconds() > 0 {
        headers.push((
            "Cache-Control".to_string(),
            format!("public, max-age={}", ctx.cache_seconds()),
        ));
    }

    DispatchResponse {
        status: status.as_u16(),
        headers,
        body,
    }
}
