//! The host framework coupling seam (spec.md §9): the current implementation
//! this system is ported from reads a specific host event object directly
//! (`event.request`, `event.params.path`, `event.cookies`); a faithful port
//! exposes an adapter trait instead so the dispatcher itself stays host-agnostic.

use std::any::Any;
use std::sync::Arc;

use http::{HeaderMap, Method, StatusCode};

/// A standard request view plus an opaque per-request adapter context, supplied
/// by whichever host framework is embedding Tango. The body must already be
/// fully buffered — Tango's dispatcher never streams a request body itself.
pub trait Adapter: Send + Sync {
    fn method(&self) -> &Method;

    /// The flattened route key this request targets (spec.md §3 "route key") —
    /// already dot-joined and kebab-cased, with no leading slash.
    fn route(&self) -> &str;

    /// The raw query string, without a leading `?`.
    fn query(&self) -> &str;

    fn headers(&self) -> &HeaderMap;

    fn body(&self) -> &[u8];

    /// The opaque host request handle stashed on [`tango_core::context::ServerContext`]
    /// (spec.md §3 `event`), downcast by middleware and implementations that know
    /// the concrete adapter in use.
    fn adapter_context(&self) -> Arc<dyn Any + Send + Sync>;

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

/// A standard response: status, headers, and a body of bytes. Adapters convert
/// this into their host framework's response type.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl DispatchResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn plain(status: StatusCode, message: &str) -> Self {
        Self {
            status: status.as_u16(),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: message.as_bytes().to_vec(),
        }
    }
}
