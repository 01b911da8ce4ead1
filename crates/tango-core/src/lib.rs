//! # tango-core
//!
//! Shared invariants between Tango's server dispatcher and client transport: the
//! wire codec, the kebab-case route normalizer, the async middleware pipeline,
//! the out-of-band middleware registry, the nested API tree and its flattener,
//! and the server/client context types that get threaded through a call.
//!
//! ## Quick start
//!
//! ```rust
//! use tango_core::tree::{implementation, ApiBuilder, Descriptor};
//! use tango_core::flatten::Api;
//! use tango_core::context::ServerContext;
//! use indexmap::IndexMap;
//! use http::HeaderMap;
//!
//! # #[tokio::main]
//! # async fn main() -> tango_core::error::Result<()> {
//! let hello = implementation(|args, _ctx| {
//!     Box::pin(async move {
//!         let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("world");
//!         Ok(serde_json::json!({ "message": format!("Hello, {name}!") }))
//!     })
//! });
//!
//! let api = Api::build(ApiBuilder::new().leaf("greet", Descriptor::query(hello)))?;
//!
//! let mut args = IndexMap::new();
//! args.insert("name".to_string(), serde_json::json!("Ada"));
//! let mut ctx = ServerContext::new(args, HeaderMap::new());
//! let result = api.dispatch("greet", &mut ctx).await?;
//! assert_eq!(result["message"], "Hello, Ada!");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod context;
pub mod error;
pub mod flatten;
pub mod kebab;
pub mod middleware;
pub mod pipeline;
pub mod tree;
pub mod upload;

pub use context::{ClientContext, Progress, ProgressPhase, RawResponse, ServerContext};
pub use error::{Error, Issue, Result};
pub use flatten::{Api, HandlerTable, RouteEntry};
pub use kebab::{kebab, kebab_path};
pub use middleware::{MiddlewareRegistry, NodeId};
pub use pipeline::{run, FnStage, Next, Stage};
pub use tree::{
    args_to_value, implementation, value_to_args, ApiBuilder, ApiNode, Descriptor,
    FnImplementation, Implementation, RpcType, Schema,
};
pub use upload::{FileUpload, UploadArg};
