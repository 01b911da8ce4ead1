//! Server-side dispatcher scenarios (spec.md §8 S1-S3, S5, S6): one in-process
//! `Api` exercised through `tango_server::dispatch::handle` with a stubbed
//! `Adapter`, no real HTTP stack involved.

use std::any::Any;
use std::sync::{Arc, Mutex};

use http::{HeaderMap, HeaderValue, Method};
use indexmap::IndexMap;
use serde_json::Value;

use tango_core::codec::{base64url, pack};
use tango_core::error::Issue;
use tango_core::pipeline::{FnStage, Next, Stage};
use tango_core::tree::{implementation, ApiBuilder, Descriptor, Schema};
use tango_core::{args_to_value, context::ServerContext};
use tango_server::{Adapter, DispatchResponse};

struct FakeAdapter {
    method: Method,
    route: String,
    query: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl FakeAdapter {
    fn new(method: Method, route: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        Self {
            method,
            route: route.to_string(),
            query: String::new(),
            headers,
            body: Vec::new(),
        }
    }

    fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers
            .insert("content-type", HeaderValue::from_str(content_type).unwrap());
        self.body = body;
        self
    }
}

impl Adapter for FakeAdapter {
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

fn echo() -> Arc<dyn tango_core::tree::Implementation> {
    implementation(|args, _ctx| Box::pin(async move { Ok(args_to_value(&args)) }))
}

/// S1: query happy path — args round-trip through base64url(pack(..)), result
/// comes back as the implementation's value.
#[tokio::test]
async fn s1_query_happy_path() {
    let profile = implementation(|_args, _ctx| {
        Box::pin(async move { Ok(serde_json::json!({"id": 1, "name": "a"})) })
    });
    let api = tango_core::flatten::Api::build(
        ApiBuilder::new().branch("users", |b| b.leaf("getProfile", Descriptor::query(profile))),
    )
    .unwrap();

    let packed = pack(&serde_json::json!({"page": 2})).unwrap();
    let query = format!("args={}", base64url(&packed));
    let req = FakeAdapter::new(Method::GET, "users.get-profile").with_query(&query);
    let resp = tango_server::handle(&api, &req).await;

    assert_eq!(resp.status, 200);
    let body: Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body, serde_json::json!({"id": 1, "name": "a"}));
}

struct MinLength(usize);
impl Schema for MinLength {
    fn parse(&self, value: Value) -> std::result::Result<Value, Vec<Issue>> {
        let title = value.get("title").and_then(|v| v.as_str()).unwrap_or("");
        if title.len() < self.0 {
            Err(vec![Issue {
                path: vec!["title".to_string()],
                message: format!("must be at least {} characters", self.0),
            }])
        } else {
            Ok(value)
        }
    }
}

/// S2: command with a validation failure — 422, the header, and an issues array body.
#[tokio::test]
async fn s2_command_validation_failure() {
    let never_called = implementation(|args, _ctx| Box::pin(async move { Ok(args_to_value(&args)) }));
    let descriptor = Descriptor::command(never_called).with_schema(Arc::new(MinLength(3)));
    let api = tango_core::flatten::Api::build(
        ApiBuilder::new().branch("posts", |b| b.leaf("create", descriptor)),
    )
    .unwrap();

    let body = pack(&serde_json::json!({"title": "Hi"})).unwrap();
    let req = FakeAdapter::new(Method::POST, "posts.create").with_body("application/msgpack", body);
    let resp = tango_server::handle(&api, &req).await;

    assert_eq!(resp.status, 422);
    assert!(resp
        .headers
        .iter()
        .any(|(k, v)| k == "X-Tango-Validation-Error" && v == "true"));
    let issues: Vec<Issue> = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, vec!["title"]);
}

/// S3: get with plain string args — no decoding, 200 OK.
#[tokio::test]
async fn s3_get_with_plain_args() {
    let get_by_id = implementation(|args, _ctx| Box::pin(async move { Ok(args_to_value(&args)) }));
    let api = tango_core::flatten::Api::build(
        ApiBuilder::new().branch("posts", |b| b.leaf("getById", Descriptor::get(get_by_id))),
    )
    .unwrap();

    let req = FakeAdapter::new(Method::GET, "posts.get-by-id").with_query("id=42");
    let resp = tango_server::handle(&api, &req).await;

    assert_eq!(resp.status, 200);
    let body: Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body["id"], "42");
}

/// S5: content-type gate — unrecognised Content-Type on a command is 415,
/// and the implementation must never run.
#[tokio::test]
async fn s5_content_type_gate_rejects_unknown_type() {
    let calls = Arc::new(Mutex::new(0));
    let calls2 = calls.clone();
    let create = implementation(move |args, _ctx| {
        let calls = calls2.clone();
        Box::pin(async move {
            *calls.lock().unwrap() += 1;
            Ok(args_to_value(&args))
        })
    });
    let api = tango_core::flatten::Api::build(
        ApiBuilder::new().branch("posts", |b| b.leaf("create", Descriptor::command(create))),
    )
    .unwrap();

    let req = FakeAdapter::new(Method::POST, "posts.create").with_body("text/plain", b"hi".to_vec());
    let resp = tango_server::handle(&api, &req).await;

    assert_eq!(resp.status, 415);
    assert_eq!(*calls.lock().unwrap(), 0);
}

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

fn logging_stage(trail: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Arc<dyn Stage<ServerContext>> {
    Arc::new(FnStage(move |ctx: &mut ServerContext, next: Next<'_, ServerContext>| {
        let trail = trail.clone();
        Box::pin(async move {
            trail.lock().unwrap().push(tag);
            next.call(ctx).await
        }) as BoxFuture<'_, tango_core::error::Result<Value>>
    }))
}

/// S6: middleware ordering — global, then group, then endpoint, then terminal.
#[tokio::test]
async fn s6_middleware_ordering_global_group_endpoint() {
    let trail: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let api = tango_core::flatten::Api::build(
        ApiBuilder::new()
            .middleware(logging_stage(trail.clone(), "global"))
            .branch("posts", |b| {
                b.middleware(logging_stage(trail.clone(), "posts"))
                    .leaf_with(
                        "create",
                        Descriptor::command(echo()),
                        vec![logging_stage(trail.clone(), "create")],
                    )
            }),
    )
    .unwrap();

    let body = pack(&serde_json::json!({})).unwrap();
    let req = FakeAdapter::new(Method::POST, "posts.create").with_body("application/msgpack", body);
    let resp = tango_server::handle(&api, &req).await;

    assert_eq!(resp.status, 200);
    assert_eq!(*trail.lock().unwrap(), vec!["global", "posts", "create"]);
}

/// Invariant 1: two endpoints claiming the same flattened route key fail at build time.
#[test]
fn duplicate_route_keys_fail_api_build() {
    let result = tango_core::flatten::Api::build(
        ApiBuilder::new()
            .leaf("getUser", Descriptor::query(echo()))
            .leaf("get-user", Descriptor::query(echo())),
    );
    assert!(result.is_err());
}

/// Unknown routes are 404, never 500 or a panic.
#[tokio::test]
async fn unknown_route_is_404_not_found() {
    let api = tango_core::flatten::Api::build(ApiBuilder::new().leaf("ping", Descriptor::query(echo()))).unwrap();
    let req = FakeAdapter::new(Method::GET, "missing");
    let resp: DispatchResponse = tango_server::handle(&api, &req).await;
    assert_eq!(resp.status, 404);
}

/// Method/rpc mismatch: POSTing to a query endpoint is 405, implementation never runs.
#[tokio::test]
async fn method_rpc_mismatch_is_405() {
    let calls = Arc::new(Mutex::new(0));
    let calls2 = calls.clone();
    let never_called = implementation(move |args, _ctx| {
        let calls = calls2.clone();
        Box::pin(async move {
            *calls.lock().unwrap() += 1;
            Ok(args_to_value(&args))
        })
    });
    let api =
        tango_core::flatten::Api::build(ApiBuilder::new().leaf("ping", Descriptor::query(never_called))).unwrap();

    let req = FakeAdapter::new(Method::POST, "ping").with_body("application/json", b"{}".to_vec());
    let resp = tango_server::handle(&api, &req).await;

    assert_eq!(resp.status, 405);
    assert_eq!(*calls.lock().unwrap(), 0);
}

/// GET cacheSeconds rule: Cache-Control only shows up for GET with a positive cache.
#[tokio::test]
async fn cache_control_only_for_get_with_positive_cache_seconds() {
    let status = implementation(|_args, ctx| {
        Box::pin(async move {
            ctx.set_cache_seconds(30.0);
            Ok(serde_json::json!({"ok": true}))
        })
    });
    let api = tango_core::flatten::Api::build(ApiBuilder::new().leaf("status", Descriptor::get(status))).unwrap();

    let req = FakeAdapter::new(Method::GET, "status");
    let resp = tango_server::handle(&api, &req).await;
    assert!(resp
        .headers
        .iter()
        .any(|(k, v)| k == "Cache-Control" && v == "public, max-age=30"));
}

/// IndexMap preserves insertion order through a query call's args round trip.
#[tokio::test]
async fn args_preserve_insertion_order_through_query_dispatch() {
    let mut args = IndexMap::new();
    args.insert("z".to_string(), Value::from(1));
    args.insert("a".to_string(), Value::from(2));
    args.insert("m".to_string(), Value::from(3));

    let value = args_to_value(&args);
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "a", "m"]);
}
