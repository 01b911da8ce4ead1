//! Middleware lists are attached to API nodes; retrieved during flattening.
//!
//! The source attaches a middleware list to a node via a non-enumerable slot so the
//! API tree's *type* can be shared with the client without leaking middleware values.
//! Rust has no non-enumerable struct fields, so this becomes an out-of-band registry
//! keyed by node identity (spec.md §9's porting note), mirroring how
//! `pforge_runtime::registry::HandlerRegistry` keeps its dispatch table separate from
//! the config tree it was built from.

use std::collections::HashMap;
use std::sync::Arc;

use crate::pipeline::Stage;

/// A stable identity for an API tree node — the address of its heap allocation.
/// Two `NodeId`s are equal iff they were taken from the same boxed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn of<T: ?Sized>(boxed: &Box<T>) -> Self {
        NodeId(boxed.as_ref() as *const T as *const () as usize)
    }
}

/// Registers middleware lists against node identities, keyed out-of-band from the
/// tree so the tree's shape stays shareable.
pub struct MiddlewareRegistry<S> {
    lists: HashMap<NodeId, Vec<Arc<dyn Stage<S>>>>,
}

impl<S> Default for MiddlewareRegistry<S> {
    fn default() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }
}

impl<S> MiddlewareRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends middleware to the list attached to `target`.
    pub fn attach(&mut self, target: NodeId, mw: Arc<dyn Stage<S>>) {
        self.lists.entry(target).or_default().push(mw);
    }

    /// Appends a whole list of middleware in order. When `target` is itself a list
    /// of node ids (the "attach to many" broadcast from spec.md §4.2), call this once
    /// per target rather than flattening the broadcast here — the registry only
    /// knows about single identities.
    pub fn attach_many(&mut self, target: NodeId, mws: impl IntoIterator<Item = Arc<dyn Stage<S>>>) {
        let entry = self.lists.entry(target).or_default();
        entry.extend(mws);
    }

    /// Returns the middleware list for `target`, or an empty slice if none is attached.
    pub fn get(&self, target: NodeId) -> &[Arc<dyn Stage<S>>] {
        self.lists.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merges another registry's entries into this one — used when a nested
    /// [`crate::tree::ApiBuilder`] branch finishes and its middleware bookkeeping
    /// needs to join the parent's before the parent node itself is boxed.
    pub fn absorb(&mut self, other: MiddlewareRegistry<S>) {
        for (id, mws) in other.lists {
            self.lists.entry(id).or_default().extend(mws);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FnStage, Next};
    use std::future::Future;
    use std::pin::Pin;

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    fn noop_stage() -> Arc<dyn Stage<()>> {
        Arc::new(FnStage(|state: &mut (), next: Next<'_, ()>| {
            Box::pin(async move { next.call(state).await })
                as BoxFuture<'_, crate::error::Result<serde_json::Value>>
        }))
    }

    #[test]
    fn attach_appends_in_order() {
        let mut registry: MiddlewareRegistry<()> = MiddlewareRegistry::new();
        let node = NodeId(1);
        assert!(registry.get(node).is_empty());

        registry.attach(node, noop_stage());
        registry.attach(node, noop_stage());
        assert_eq!(registry.get(node).len(), 2);
    }

    #[test]
    fn different_nodes_are_independent() {
        let mut registry: MiddlewareRegistry<()> = MiddlewareRegistry::new();
        registry.attach(NodeId(1), noop_stage());
        assert_eq!(registry.get(NodeId(1)).len(), 1);
        assert!(registry.get(NodeId(2)).is_empty());
    }

    #[test]
    fn attach_many_preserves_registration_order() {
        let mut registry: MiddlewareRegistry<()> = MiddlewareRegistry::new();
        let node = NodeId(3);
        registry.attach_many(node, vec![noop_stage(), noop_stage(), noop_stage()]);
        assert_eq!(registry.get(node).len(), 3);
    }
}
