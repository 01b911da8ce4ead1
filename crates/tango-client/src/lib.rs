//! # tango-client
//!
//! The client half of Tango's wire protocol: a path-accumulating call
//! builder standing in for the dynamically dispatched call proxy (spec.md
//! §4.7), a middleware config keyed by dotted route, and a `reqwest`-backed
//! transport that honours `Accept: application/msgpack`, file uploads,
//! upload/download progress, and cooperative abort (spec.md §4.8).
//!
//! ```rust,no_run
//! use tango_client::TangoClient;
//! use indexmap::IndexMap;
//!
//! # #[tokio::main]
//! # async fn main() -> tango_core::error::Result<()> {
//! let client = TangoClient::new("https://api.example.com");
//! let mut args = IndexMap::new();
//! args.insert("name".to_string(), serde_json::json!("Ada"));
//! let result = client.call().path("greet").query(args).await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod middleware;
pub mod transport;

pub use call::{route_key, Call, CallOptions, TangoClient};
pub use middleware::ClientMiddlewareConfig;
