//! The call builder: Tango's answer to the dynamically-typed call proxy
//! (spec.md §4.7 "Call proxy"). A JS `Proxy` turns arbitrary property access
//! into path segments and a fixed set of magic keys into the terminal call;
//! Rust has neither dynamic property access nor optional/variadic call sites,
//! so the same shape is built with an explicit path-accumulating builder and
//! one method per `{rpcType} x {plain, _ctx}` combination instead of magic
//! properties.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tango_core::context::{ClientContext, Progress};
use tango_core::error::Result;
use tango_core::kebab::kebab_path;
use tango_core::pipeline;
use tango_core::pipeline::{FnStage, Next, Stage};
use tango_core::tree::RpcType;
use tango_core::upload::{FileUpload, UploadArg};

use crate::middleware::ClientMiddlewareConfig;
use crate::transport;

/// Per-call overrides: abort signal and progress callback (spec.md §4.8 steps 4-5).
#[derive(Default, Clone)]
pub struct CallOptions {
    pub abort: Option<CancellationToken>,
    pub on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abort(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

pub struct TangoClient {
    http: reqwest::Client,
    base_url: String,
    middleware: ClientMiddlewareConfig,
}

impl TangoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            middleware: ClientMiddlewareConfig::new(),
        }
    }

    pub fn middleware(&mut self) -> &mut ClientMiddlewareConfig {
        &mut self.middleware
    }

    /// Starts a call at the root — equivalent to the bare proxy object
    /// before any property access (spec.md §4.7).
    pub fn call(&self) -> Call<'_> {
        Call {
            client: self,
            path: Vec::new(),
            uploads: IndexMap::new(),
        }
    }
}

/// Accumulates a dotted path (and, for commands, file uploads) before one of
/// the terminal methods dispatches the call.
pub struct Call<'a> {
    client: &'a TangoClient,
    path: Vec<String>,
    uploads: IndexMap<String, UploadArg>,
}

impl<'a> Call<'a> {
    /// Extends the accumulated path — the non-magic-key branch of the proxy.
    pub fn path(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    /// Attaches a single file upload under `name` for a subsequent `command`
    /// call — sent as a plain `name` field, never `name[]` (spec.md §4.8 step 3).
    pub fn upload(mut self, name: impl Into<String>, file: FileUpload) -> Self {
        self.uploads.insert(name.into(), UploadArg::Single(file));
        self
    }

    /// Attaches a list of file uploads under `name` — sent as one part per
    /// element, every part named with a `[]` field-name suffix regardless of
    /// how many elements the list holds (spec.md §4.8 step 3, invariant 9).
    pub fn uploads(mut self, name: impl Into<String>, files: Vec<FileUpload>) -> Self {
        self.uploads.insert(name.into(), UploadArg::List(files));
        self
    }

    pub async fn query(self, args: IndexMap<String, Value>) -> Result<Value> {
        self.query_ctx(args, CallOptions::default()).await.map(|ctx| ctx.result.unwrap_or(Value::Null))
    }

    pub async fn query_ctx(self, args: IndexMap<String, Value>, options: CallOptions) -> Result<ClientContext> {
        self.run(RpcType::Query, args, options).await
    }

    pub async fn get(self, args: IndexMap<String, Value>) -> Result<Value> {
        self.get_ctx(args, CallOptions::default()).await.map(|ctx| ctx.result.unwrap_or(Value::Null))
    }

    pub async fn get_ctx(self, args: IndexMap<String, Value>, options: CallOptions) -> Result<ClientContext> {
        self.run(RpcType::Get, args, options).await
    }

    pub async fn command(self, args: IndexMap<String, Value>) -> Result<Value> {
        self.command_ctx(args, CallOptions::default()).await.map(|ctx| ctx.result.unwrap_or(Value::Null))
    }

    pub async fn command_ctx(self, args: IndexMap<String, Value>, options: CallOptions) -> Result<ClientContext> {
        self.run(RpcType::Command, args, options).await
    }

    async fn run(self, rpc_type: RpcType, args: IndexMap<String, Value>, options: CallOptions) -> Result<ClientContext> {
        let path = self.path.clone();
        let mut ctx = ClientContext::new(path.clone(), args, rpc_type).with_uploads(self.uploads);
        ctx.abort = options.abort;
        ctx.on_progress = options.on_progress;

        let mut chain = self.client.middleware.chain_for(&path);
        chain.push(terminal_stage(self.client.http.clone(), self.client.base_url.clone()));

        pipeline::run(&mut ctx, &chain).await?;
        Ok(ctx)
    }
}

fn terminal_stage(http: reqwest::Client, base_url: String) -> Arc<dyn Stage<ClientContext>> {
    Arc::new(FnStage(move |ctx: &mut ClientContext, _next: Next<'_, ClientContext>| {
        let http = http.clone();
        let base_url = base_url.clone();
        Box::pin(async move {
            transport::send(&http, &base_url, ctx).await?;
            Ok(ctx.result.clone().unwrap_or(Value::Null))
        }) as std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + Send + '_>>
    }))
}

/// Convenience for building a route key outside of a call, e.g. for logging
/// or for registering middleware against a path built the same way a call builds one.
pub fn route_key(path: &[String]) -> String {
    kebab_path(path.iter())
}
