//! Per-call mutable state bag: path, args, rpc type, request headers,
//! progress/abort hooks, response, result, elapsed time (spec.md §3, §4.7).

use std::sync::Arc;
use std::time::Instant;

use http::HeaderMap;
use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tree::RpcType;

/// A progress event reported during upload or download (spec.md §4.8.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: u64,
    pub percent: u8,
    pub phase: ProgressPhase,
}

impl Progress {
    pub fn new(loaded: u64, total: u64, phase: ProgressPhase) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((100.0 * loaded as f64 / total as f64).round() as u64).min(100) as u8
        };
        Self {
            loaded,
            total,
            percent,
            phase,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Upload,
    Download,
}

/// The raw wire response, stashed on the context before decoding (spec.md §4.8.6).
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Per-call mutable state bag threaded through the client's middleware chain.
///
/// `uploads` is populated ahead of time by the call builder rather than
/// discovered by scanning `args` for file handles at transport time (spec.md
/// §4.8 step 2) — Rust's static typing means a file argument is never
/// ambiguous with a plain value in the first place, so there is nothing left
/// for the transport to "extract".
pub struct ClientContext {
    pub path: Vec<String>,
    pub args: IndexMap<String, Value>,
    pub uploads: IndexMap<String, crate::upload::UploadArg>,
    pub rpc_type: RpcType,
    pub request_headers: HeaderMap,
    pub abort: Option<CancellationToken>,
    pub on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
    pub response: Option<RawResponse>,
    pub result: Option<Value>,
    start: Instant,
}

impl ClientContext {
    pub fn new(path: Vec<String>, args: IndexMap<String, Value>, rpc_type: RpcType) -> Self {
        let mut request_headers = HeaderMap::new();
        request_headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/msgpack"),
        );
        Self {
            path,
            args,
            uploads: IndexMap::new(),
            rpc_type,
            request_headers,
            abort: None,
            on_progress: None,
            response: None,
            result: None,
            start: Instant::now(),
        }
    }

    pub fn with_uploads(mut self, uploads: IndexMap<String, crate::upload::UploadArg>) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
