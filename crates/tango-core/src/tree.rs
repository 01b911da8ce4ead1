//! The nested API definition: rpc types, descriptors, the schema seam, and the
//! builder that assembles a tree of them (spec.md §3 "API tree" / "Endpoint
//! descriptor", §9 "Schema library pluggability").
//!
//! Generalizes `pforge_config::ToolDef`'s declarative tool list (itself parsed
//! from YAML) into a tree assembled with plain Rust builder calls — Tango's API
//! shape is authored directly in the server language, so there is no IDL to
//! parse (SPEC_FULL.md §7).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::context::ServerContext;
use crate::error::{Error, Issue, Result};
use crate::middleware::{MiddlewareRegistry, NodeId};
use crate::pipeline::Stage;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Determines HTTP method and argument encoding (spec.md §2, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcType {
    Query,
    Command,
    Get,
}

impl RpcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcType::Query => "query",
            RpcType::Command => "command",
            RpcType::Get => "get",
        }
    }
}

/// The pluggable validator seam: `parse(value) -> value | issues[]` (spec.md §9).
pub trait Schema: Send + Sync {
    fn parse(&self, value: Value) -> std::result::Result<Value, Vec<Issue>>;
}

/// A user implementation: `(args, ctx) -> value | lazy value` (spec.md §3).
pub trait Implementation: Send + Sync {
    fn call<'a>(
        &'a self,
        args: IndexMap<String, Value>,
        ctx: &'a mut ServerContext,
    ) -> BoxFuture<'a, Result<Value>>;
}

/// Adapts a plain async closure into an [`Implementation`], mirroring
/// [`crate::pipeline::FnStage`]'s treatment of middleware closures.
pub struct FnImplementation<F>(pub F);

impl<F> Implementation for FnImplementation<F>
where
    F: for<'a> Fn(IndexMap<String, Value>, &'a mut ServerContext) -> BoxFuture<'a, Result<Value>>
        + Send
        + Sync,
{
    fn call<'a>(
        &'a self,
        args: IndexMap<String, Value>,
        ctx: &'a mut ServerContext,
    ) -> BoxFuture<'a, Result<Value>> {
        (self.0)(args, ctx)
    }
}

/// Convenience constructor for [`FnImplementation`], boxed into an `Arc`.
pub fn implementation<F>(f: F) -> Arc<dyn Implementation>
where
    F: for<'a> Fn(IndexMap<String, Value>, &'a mut ServerContext) -> BoxFuture<'a, Result<Value>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnImplementation(f))
}

/// A leaf of the API tree: an rpc type, an implementation, and an optional
/// schema. Immutable once built (spec.md §3) — the middleware list attached to
/// it lives out-of-band in the [`MiddlewareRegistry`], not on this struct.
#[derive(Clone)]
pub struct Descriptor {
    pub rpc_type: RpcType,
    pub implementation: Arc<dyn Implementation>,
    pub schema: Option<Arc<dyn Schema>>,
}

impl Descriptor {
    pub fn new(rpc_type: RpcType, implementation: Arc<dyn Implementation>) -> Self {
        Self {
            rpc_type,
            implementation,
            schema: None,
        }
    }

    pub fn query(implementation: Arc<dyn Implementation>) -> Self {
        Self::new(RpcType::Query, implementation)
    }

    pub fn command(implementation: Arc<dyn Implementation>) -> Self {
        Self::new(RpcType::Command, implementation)
    }

    pub fn get(implementation: Arc<dyn Implementation>) -> Self {
        Self::new(RpcType::Get, implementation)
    }

    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// A node of the API tree: either another nested mapping, or a leaf descriptor.
/// The tree's shape is what gets shared with clients (spec.md §3) — middleware
/// never lives on this enum.
pub enum ApiNode {
    Branch(IndexMap<String, Box<ApiNode>>),
    Leaf(Descriptor),
}

impl ApiNode {
    pub fn as_leaf(&self) -> Option<&Descriptor> {
        match self {
            ApiNode::Leaf(d) => Some(d),
            ApiNode::Branch(_) => None,
        }
    }
}

/// Depth-first assembly of an [`ApiNode::Branch`]. Middleware attached via
/// [`ApiBuilder::middleware`] applies to every descendant of this node; the
/// bookkeeping lives in a [`MiddlewareRegistry`] keyed by node identity rather
/// than on the node itself (spec.md §4.2, §9's non-enumerable-slot porting note).
pub struct ApiBuilder {
    children: IndexMap<String, Box<ApiNode>>,
    registry: MiddlewareRegistry<ServerContext>,
    own_middleware: Vec<Arc<dyn Stage<ServerContext>>>,
}

impl Default for ApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiBuilder {
    pub fn new() -> Self {
        Self {
            children: IndexMap::new(),
            registry: MiddlewareRegistry::new(),
            own_middleware: Vec::new(),
        }
    }

    /// Attaches middleware to this branch — every leaf beneath it inherits it,
    /// ahead of any middleware attached closer to the leaf (spec.md §4.7 ordering).
    pub fn middleware(mut self, mw: Arc<dyn Stage<ServerContext>>) -> Self {
        self.own_middleware.push(mw);
        self
    }

    pub fn leaf(self, name: impl Into<String>, descriptor: Descriptor) -> Self {
        self.leaf_with(name, descriptor, Vec::new())
    }

    pub fn leaf_with(
        mut self,
        name: impl Into<String>,
        descriptor: Descriptor,
        mw: Vec<Arc<dyn Stage<ServerContext>>>,
    ) -> Self {
        let boxed = Box::new(ApiNode::Leaf(descriptor));
        let id = NodeId::of(&boxed);
        self.registry.attach_many(id, mw);
        self.children.insert(name.into(), boxed);
        self
    }

    /// Recurses into a nested branch, merging its middleware registry into this
    /// one once its own node identity is known (i.e. after it is boxed).
    pub fn branch(mut self, name: impl Into<String>, build: impl FnOnce(ApiBuilder) -> ApiBuilder) -> Self {
        let child = build(ApiBuilder::new());
        let (node, child_registry) = child.finish();
        self.registry.absorb(child_registry);
        self.children.insert(name.into(), node);
        self
    }

    fn finish(self) -> (Box<ApiNode>, MiddlewareRegistry<ServerContext>) {
        let boxed = Box::new(ApiNode::Branch(self.children));
        let id = NodeId::of(&boxed);
        let mut registry = self.registry;
        registry.attach_many(id, self.own_middleware);
        (boxed, registry)
    }

    /// Finishes the tree, returning the root node plus the middleware registry
    /// keyed off every node in it.
    pub fn build(self) -> (Box<ApiNode>, MiddlewareRegistry<ServerContext>) {
        self.finish()
    }
}

/// Converts a JSON `Value::Object` into args, rejecting anything else — used
/// when decoding `query`/`command` bodies and schema-parsed results alike.
pub fn value_to_args(value: Value) -> Result<IndexMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(IndexMap::new()),
        _ => Err(Error::BadRequest("args must be an object".to_string())),
    }
}

pub fn args_to_value(args: &IndexMap<String, Value>) -> Value {
    Value::Object(args.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Arc<dyn Implementation> {
        implementation(|args, _ctx| Box::pin(async move { Ok(args_to_value(&args)) }))
    }

    #[test]
    fn builder_assembles_nested_tree() {
        let (root, _registry) = ApiBuilder::new()
            .branch("users", |b| {
                b.leaf("get-profile", Descriptor::query(echo()))
            })
            .build();

        match *root {
            ApiNode::Branch(children) => {
                assert!(children.contains_key("users"));
                match children.get("users").unwrap().as_ref() {
                    ApiNode::Branch(inner) => assert!(inner.contains_key("get-profile")),
                    ApiNode::Leaf(_) => panic!("expected branch"),
                }
            }
            ApiNode::Leaf(_) => panic!("expected branch"),
        }
    }

    #[test]
    fn value_to_args_round_trips_object() {
        let value = serde_json::json!({"a": 1, "b": "two"});
        let args = value_to_args(value.clone()).unwrap();
        assert_eq!(args_to_value(&args), value);
    }

    #[test]
    fn value_to_args_rejects_non_object() {
        let err = value_to_args(serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
