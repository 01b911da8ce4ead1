//! # tango-server
//!
//! The server half of Tango's wire protocol: a host-framework-agnostic
//! [`Adapter`] seam, per-rpcType argument parsing, and response serialization
//! (spec.md §4.6). Everything here is pure and testable without a real HTTP
//! stack; the optional `axum` feature wires it into an `axum::Router`.

pub mod adapter;
pub mod args;
pub mod dispatch;
pub mod multipart;

#[cfg(feature = "axum")]
pub mod axum_integration;

pub use adapter::{Adapter, DispatchResponse};
pub use dispatch::handle;
