//! Per-request mutable state bag: parsed args, headers in/out, status, cache
//! directive, env, elapsed time, status shortcut set (spec.md §3, §4.9).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;

/// Expands to one canonical-code setter per entry, mirroring spec.md §6's fixed
/// enumerated shortcut list. `continue` is a Rust keyword so it's spelled
/// `r#continue`; the 415 entry is named `unsupported_media_type` rather than the
/// spec's literal `badContent` — that name is preserved nowhere else in the pack
/// and the canonical HTTP reason phrase reads better on a public method.
macro_rules! status_shortcuts {
    ($($name:ident => $code:expr),+ $(,)?) => {
        $(
            pub fn $name(&mut self) {
                self.status = $code;
            }
        )+
    };
}

/// Per-request mutable state bag threaded through the middleware pipeline and
/// into the terminal validator + implementation stage.
///
/// Invariants (spec.md §3): `status` is always a valid HTTP code; `cache_seconds`
/// is `max(0, floor(input))`; elapsed time is computed from `start` at read time
/// rather than cached.
pub struct ServerContext {
    args: IndexMap<String, Value>,
    uploads: IndexMap<String, Vec<crate::upload::FileUpload>>,
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    status: StatusCode,
    cache_seconds: u64,
    env: HashMap<String, Value>,
    event: Arc<dyn Any + Send + Sync>,
    start: Instant,
}

impl ServerContext {
    pub fn new(args: IndexMap<String, Value>, request_headers: HeaderMap) -> Self {
        Self::with_event(args, request_headers, Arc::new(()))
    }

    /// `event` is the opaque host request handle (spec.md §3) — an adapter
    /// downcasts it back to its own request type via [`ServerContext::event_as`].
    pub fn with_event(
        args: IndexMap<String, Value>,
        request_headers: HeaderMap,
        event: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            args,
            uploads: IndexMap::new(),
            request_headers,
            response_headers: HeaderMap::new(),
            status: StatusCode::OK,
            cache_seconds: 0,
            env: HashMap::new(),
            event,
            start: Instant::now(),
        }
    }

    pub fn set_uploads(&mut self, uploads: IndexMap<String, Vec<crate::upload::FileUpload>>) {
        self.uploads = uploads;
    }

    pub fn uploads(&self) -> &IndexMap<String, Vec<crate::upload::FileUpload>> {
        &self.uploads
    }

    /// `ctx.getArgs()`: a fresh copy of the args map, in insertion order.
    pub fn get_args(&self) -> IndexMap<String, Value> {
        self.args.clone()
    }

    pub fn args(&self) -> &IndexMap<String, Value> {
        &self.args
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// `ctx.cache.set(n)`: clamps to `max(0, floor(n))`.
    pub fn set_cache_seconds(&mut self, n: f64) {
        self.cache_seconds = n.floor().max(0.0) as u64;
    }

    pub fn cache_seconds(&self) -> u64 {
        self.cache_seconds
    }

    pub fn env(&self) -> &HashMap<String, Value> {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.env
    }

    pub fn event(&self) -> &(dyn Any + Send + Sync) {
        self.event.as_ref()
    }

    pub fn event_as<T: Any>(&self) -> Option<&T> {
        self.event.downcast_ref::<T>()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// `X-Tango-Execution-Time`, a decimal millisecond string.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    status_shortcuts! {
        r#continue => StatusCode::CONTINUE,
        switching_protocols => StatusCode::SWITCHING_PROTOCOLS,
        processing => StatusCode::from_u16(102).unwrap(),
        ok => StatusCode::OK,
        created => StatusCode::CREATED,
        accepted => StatusCode::ACCEPTED,
        no_content => StatusCode::NO_CONTENT,
        reset_content => StatusCode::RESET_CONTENT,
        partial_content => StatusCode::PARTIAL_CONTENT,
        multiple_choices => StatusCode::MULTIPLE_CHOICES,
        moved_permanently => StatusCode::MOVED_PERMANENTLY,
        found => StatusCode::FOUND,
        see_other => StatusCode::SEE_OTHER,
        not_modified => StatusCode::NOT_MODIFIED,
        temporary_redirect => StatusCode::TEMPORARY_REDIRECT,
        permanent_redirect => StatusCode::PERMANENT_REDIRECT,
        bad_request => StatusCode::BAD_REQUEST,
        unauthorized => StatusCode::UNAUTHORIZED,
        payment_required => StatusCode::PAYMENT_REQUIRED,
        forbidden => StatusCode::FORBIDDEN,
        not_found => StatusCode::NOT_FOUND,
        method_not_allowed => StatusCode::METHOD_NOT_ALLOWED,
        not_acceptable => StatusCode::NOT_ACCEPTABLE,
        conflict => StatusCode::CONFLICT,
        gone => StatusCode::GONE,
        length_required => StatusCode::LENGTH_REQUIRED,
        precondition_failed => StatusCode::PRECONDITION_FAILED,
        payload_too_large => StatusCode::PAYLOAD_TOO_LARGE,
        uri_too_long => StatusCode::URI_TOO_LONG,
        unsupported_media_type => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        range_not_satisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        expectation_failed => StatusCode::EXPECTATION_FAILED,
        too_many_requests => StatusCode::TOO_MANY_REQUESTS,
        server_error => StatusCode::INTERNAL_SERVER_ERROR,
        not_implemented => StatusCode::NOT_IMPLEMENTED,
        bad_gateway => StatusCode::BAD_GATEWAY,
        service_unavailable => StatusCode::SERVICE_UNAVAILABLE,
        gateway_timeout => StatusCode::GATEWAY_TIMEOUT,
        http_version_not_supported => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
    }
}
