//! Wires a [`tango_core::flatten::Api`] into an `axum::Router` (feature `axum`).
//!
//! One wildcard route catches every dotted endpoint key; the dispatcher itself
//! already does method and rpcType gating, so the router has nothing more to do
//! than buffer the request into an [`Adapter`] and translate the
//! [`DispatchResponse`] back into an axum response.

use std::any::Any;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;

use tango_core::flatten::Api;

use crate::adapter::{Adapter, DispatchResponse};
use crate::dispatch::handle;

struct BufferedAdapter {
    method: Method,
    route: String,
    query: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Adapter for BufferedAdapter {
    fn method(&self) -> &Method {
        &self.method
    }

    fn route(&self) -> &str {
        &self.route
    }

    fn query(&self) -> &str {
        &self.query
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn adapter_context(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::new(())
    }
}

impl From<DispatchResponse> for Response {
    fn from(resp: DispatchResponse) -> Self {
        let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::http::Response::builder().status(status);
        for (name, value) in resp.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(axum::body::Body::from(resp.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

async fn route_handler(
    State(api): State<Arc<Api>>,
    Path(route): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let adapter = BufferedAdapter {
        method,
        route,
        query: query.unwrap_or_default(),
        headers,
        body,
    };
    let response = handle(&api, &adapter).await;
    response.into()
}

/// Mounts `api` at every path of the shape `/{route}`, where `route` is the
/// flattened dot-joined key (spec.md §3). Callers that need a different path
/// shape should handle routing themselves and call [`crate::dispatch::handle`]
/// directly instead of using this router.
pub fn into_router(api: Api) -> Router {
    Router::new()
        .route("/{route}", any(route_handler))
        .with_state(Arc::new(api))
}
