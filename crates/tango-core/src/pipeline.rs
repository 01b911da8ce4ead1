//! Runs an ordered chain of middleware over a shared state value; each stage may
//! short-circuit or call `next()`.
//!
//! Generalizes `pforge_runtime::middleware::MiddlewareChain::execute`'s fixed
//! before/handler/after sandwich into the `(state, next)` contract spec.md describes:
//! a stage receives the state and a single-shot continuation, and must return either
//! the continuation's result or a value it supplies itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{Error, Result};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single pipeline stage. `next` is the injected continuation; a well-behaved
/// stage either returns `next.call(state).await` or a value of its own choosing.
pub trait Stage<S>: Send + Sync {
    fn call<'a>(&'a self, state: &'a mut S, next: Next<'a, S>) -> BoxFuture<'a, Result<serde_json::Value>>;
}

/// The injected continuation passed to a stage. Calling it more than once, or not at
/// all, is a programming error the pipeline does not protect against — the contract
/// is documented, not enforced (spec.md §3 "Middleware").
pub struct Next<'a, S> {
    remaining: &'a [Arc<dyn Stage<S>>],
}

impl<'a, S> Next<'a, S>
where
    S: Send,
{
    pub fn call(self, state: &'a mut S) -> BoxFuture<'a, Result<serde_json::Value>> {
        run_slice(state, self.remaining)
    }
}

fn run_slice<'a, S>(state: &'a mut S, stages: &'a [Arc<dyn Stage<S>>]) -> BoxFuture<'a, Result<serde_json::Value>>
where
    S: Send,
{
    Box::pin(async move {
        match stages.split_first() {
            Some((head, tail)) => head.call(state, Next { remaining: tail }).await,
            None => Err(Error::PipelineExhausted),
        }
    })
}

/// `run(state, [m1, ..., mn])` invokes `m1(state, next1)` where `nextN()` invokes
/// `mN+1(state, nextN+1)`. The caller is responsible for appending a terminal stage
/// that returns without calling `next` — that terminal's absence is what turns
/// exhaustion into `Error::PipelineExhausted` rather than a happy-path outcome.
pub async fn run<S>(state: &mut S, stages: &[Arc<dyn Stage<S>>]) -> Result<serde_json::Value>
where
    S: Send,
{
    run_slice(state, stages).await
}

/// Adapts a plain async closure into a [`Stage`]. Most middleware is written this way
/// rather than as a named type implementing the trait directly. The closure must
/// itself return a boxed future (typically `Box::pin(async move { ... })`) since a
/// bare associated `Future` type cannot vary over the per-call lifetime `'a`.
pub struct FnStage<F>(pub F);

impl<S, F> Stage<S> for FnStage<F>
where
    S: Send,
    F: for<'a> Fn(&'a mut S, Next<'a, S>) -> BoxFuture<'a, Result<serde_json::Value>> + Send + Sync,
{
    fn call<'a>(&'a self, state: &'a mut S, next: Next<'a, S>) -> BoxFuture<'a, Result<serde_json::Value>> {
        (self.0)(state, next)
    }
}
