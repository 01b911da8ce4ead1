//! Per-request (server) and per-call (client) mutable state bags threaded through
//! the pipeline executor (spec.md §3, §4.9, §4.7).

mod client;
mod server;

pub use client::{ClientContext, Progress, ProgressPhase, RawResponse};
pub use server::ServerContext;
