//! Minimal end-to-end demonstration: one process hosts a Tango API behind
//! `axum` and immediately calls it back with a `TangoClient`, exercising all
//! three rpc types — a `query`, a `command` with a schema, and a `get`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tango_client::TangoClient;
use tango_core::error::Issue;
use tango_core::tree::{implementation, ApiBuilder, Descriptor, Schema};
use tango_server::axum_integration::into_router;

struct NonEmptyTitle;

impl Schema for NonEmptyTitle {
    fn parse(&self, value: Value) -> Result<Value, Vec<Issue>> {
        let title = value.get("title").and_then(|v| v.as_str()).unwrap_or("");
        if title.trim().is_empty() {
            Err(vec![Issue {
                path: vec!["title".to_string()],
                message: "title must not be empty".to_string(),
            }])
        } else {
            Ok(value)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tango_demo_basic=info")))
        .init();

    let post_count = Arc::new(AtomicU64::new(0));
    let post_count_for_create = post_count.clone();

    let get_profile = implementation(|args, _ctx| {
        Box::pin(async move {
            let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("world").to_string();
            Ok(serde_json::json!({ "greeting": format!("Hello, {name}!") }))
        })
    });

    let create_post = implementation(move |args, _ctx| {
        let post_count = post_count_for_create.clone();
        Box::pin(async move {
            let id = post_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(serde_json::json!({ "id": id, "title": args.get("title").cloned().unwrap_or(Value::Null) }))
        })
    });

    let status = implementation(|_args, ctx| {
        Box::pin(async move {
            ctx.set_cache_seconds(5.0);
            Ok(serde_json::json!({ "status": "ok" }))
        })
    });

    let api = tango_core::flatten::Api::build(
        ApiBuilder::new()
            .branch("users", |b| b.leaf("greet", Descriptor::query(get_profile)))
            .branch("posts", |b| {
                b.leaf("create", Descriptor::command(create_post).with_schema(Arc::new(NonEmptyTitle)))
            })
            .leaf("status", Descriptor::get(status)),
    )?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = into_router(api);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    info!(%addr, "demo server listening");

    let client = TangoClient::new(format!("http://{addr}"));

    let mut greet_args = IndexMap::new();
    greet_args.insert("name".to_string(), serde_json::json!("Ada"));
    let greeting = client.call().path("users").path("greet").query(greet_args).await?;
    println!("query  users.greet      -> {greeting}");

    let mut create_args = IndexMap::new();
    create_args.insert("title".to_string(), serde_json::json!("Hello, Tango"));
    let created = client.call().path("posts").path("create").command(create_args).await?;
    println!("command posts.create    -> {created}");

    let rejected = client
        .call()
        .path("posts")
        .path("create")
        .command(IndexMap::new())
        .await;
    println!("command posts.create (invalid) -> {rejected:?}");

    let status = client.call().path("status").get(IndexMap::new()).await?;
    println!("get     status           -> {status}");

    Ok(())
}
