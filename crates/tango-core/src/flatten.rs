//! Startup transformation from the nested API tree into a flat `{route key ->
//! pre-composed handler}` table (spec.md §3 "Flattened handler table", §4.5).
//!
//! Generalizes `pforge_runtime::registry::HandlerRegistry`'s
//! `FxHashMap<String, Arc<dyn HandlerEntry>>` (built once, read many times, O(1)
//! average lookup) to a table whose entries are whole pipelines rather than bare
//! handler fns.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::context::ServerContext;
use crate::error::{Error, Result};
use crate::kebab::kebab_path;
use crate::middleware::{MiddlewareRegistry, NodeId};
use crate::pipeline::{self, FnStage, Next, Stage};
use crate::tree::{args_to_value, value_to_args, ApiBuilder, ApiNode, Descriptor};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One entry of the flattened table: the rpc type (for the method/rpc gate) and
/// the fully composed middleware + validation + implementation chain.
pub struct RouteEntry {
    pub rpc_type: crate::tree::RpcType,
    stages: Vec<Arc<dyn Stage<ServerContext>>>,
}

impl RouteEntry {
    pub async fn run(&self, ctx: &mut ServerContext) -> Result<Value> {
        pipeline::run(ctx, &self.stages).await
    }
}

/// `{route key -> RouteEntry}`, built once at `Api::build()` and never mutated
/// afterwards — safe to share across concurrently handled requests.
pub struct HandlerTable {
    routes: FxHashMap<String, RouteEntry>,
}

impl HandlerTable {
    pub fn get(&self, key: &str) -> Option<&RouteEntry> {
        self.routes.get(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

/// The built, immutable API: a flattened [`HandlerTable`] ready to serve requests.
pub struct Api {
    table: HandlerTable,
}

impl Api {
    /// Flattens `builder`'s tree into a route table. Fails if two endpoints
    /// share a route key (spec.md §8 invariant 1).
    pub fn build(builder: ApiBuilder) -> Result<Api> {
        let (root, registry) = builder.build();
        let mut routes = FxHashMap::default();
        let mut segments = Vec::new();
        flatten(&root, &registry, &mut segments, &[], &mut routes)?;
        Ok(Api {
            table: HandlerTable { routes },
        })
    }

    pub fn table(&self) -> &HandlerTable {
        &self.table
    }

    pub async fn dispatch(&self, route_key: &str, ctx: &mut ServerContext) -> Result<Value> {
        match self.table.get(route_key) {
            Some(entry) => entry.run(ctx).await,
            None => Err(Error::RouteNotFound),
        }
    }
}

fn flatten(
    node: &Box<ApiNode>,
    registry: &MiddlewareRegistry<ServerContext>,
    segments: &mut Vec<String>,
    prefix: &[Arc<dyn Stage<ServerContext>>],
    routes: &mut FxHashMap<String, RouteEntry>,
) -> Result<()> {
    let id = NodeId::of(node);
    let mut chain: Vec<Arc<dyn Stage<ServerContext>>> = prefix.to_vec();
    chain.extend(registry.get(id).iter().cloned());

    match node.as_ref() {
        ApiNode::Leaf(descriptor) => {
            let key = kebab_path(segments.iter());
            if routes.contains_key(&key) {
                return Err(Error::DuplicateRoute(key));
            }
            chain.push(terminal_stage(descriptor.clone()));
            routes.insert(
                key,
                RouteEntry {
                    rpc_type: descriptor.rpc_type,
                    stages: chain,
                },
            );
        }
        ApiNode::Branch(children) => {
            for (name, child) in children {
                segments.push(name.clone());
                flatten(child, registry, segments, &chain, routes)?;
                segments.pop();
            }
        }
    }
    Ok(())
}

/// `terminal(ctx) => schema.parse(ctx.getArgs()) |> implementation(parsedArgs, ctx)`
/// (spec.md §4.5). Captured once at flattening time, never rebuilt per request.
fn terminal_stage(descriptor: Descriptor) -> Arc<dyn Stage<ServerContext>> {
    Arc::new(FnStage(
        move |ctx: &mut ServerContext, _next: Next<'_, ServerContext>| {
            let descriptor = descriptor.clone();
            Box::pin(async move {
                let args = ctx.get_args();
                let parsed_args = match &descriptor.schema {
                    Some(schema) => match schema.parse(args_to_value(&args)) {
                        Ok(parsed) => value_to_args(parsed)?,
                        Err(issues) => return Err(Error::Validation(issues)),
                    },
                    None => args,
                };
                descriptor.implementation.call(parsed_args, ctx).await
            }) as BoxFuture<'_, Result<Value>>
        },
    ))
}
