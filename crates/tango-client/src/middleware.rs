//! The client's middleware map: kebab route key → middleware list (spec.md
//! §4.7 "Config proxy"). Unlike the server's [`tango_core::middleware::MiddlewareRegistry`],
//! which keys off tree node identity, the client has no tree to walk — callers
//! register middleware directly against the dotted route key a call will use,
//! so a plain ordered map is enough.

use std::sync::Arc;

use indexmap::IndexMap;

use tango_core::kebab::kebab_path;
use tango_core::pipeline::Stage;

use crate::context::ClientContext;

const GLOBAL_KEY: &str = "";

/// Accumulates middleware lists keyed by route prefix. Registering twice at
/// the same key appends rather than replaces (spec.md §4.7 "append semantics").
#[derive(Default)]
pub struct ClientMiddlewareConfig {
    lists: IndexMap<String, Vec<Arc<dyn Stage<ClientContext>>>>,
}

impl ClientMiddlewareConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `cfg.$ = middleware[]` — applies to every call.
    pub fn global(&mut self, mw: Arc<dyn Stage<ClientContext>>) -> &mut Self {
        self.lists.entry(GLOBAL_KEY.to_string()).or_default().push(mw);
        self
    }

    /// `cfg.path.to.endpoint = middleware` or `cfg.path.$ = middleware[]` —
    /// `prefix` is the raw (non-kebab) segment path this middleware applies to.
    pub fn at(&mut self, prefix: &[String], mw: Arc<dyn Stage<ClientContext>>) -> &mut Self {
        let key = kebab_path(prefix.iter());
        self.lists.entry(key).or_default().push(mw);
        self
    }

    /// Assembles the chain for a call to `path`: global first, then each
    /// ascending-depth prefix of `path`, each in registration order.
    pub fn chain_for(&self, path: &[String]) -> Vec<Arc<dyn Stage<ClientContext>>> {
        let mut chain = Vec::new();
        if let Some(global) = self.lists.get(GLOBAL_KEY) {
            chain.extend(global.iter().cloned());
        }
        for depth in 1..=path.len() {
            let key = kebab_path(path[..depth].iter());
            if let Some(mw) = self.lists.get(&key) {
                chain.extend(mw.iter().cloned());
            }
        }
        chain
    }
}
