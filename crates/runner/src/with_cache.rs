//! Cache-backed task decorator.
//!
//! Wraps a task body so its result is served from and written back to the
//! shared cache: a fresh hit resolves immediately and the body never runs;
//! a successful outcome is stored with the configured TTL. Errors are never
//! cached, so a failed task re-runs on the next request for its key.

use crate::TaskCtx;
use keyproofs_cache::TaskCache;
use std::future::Future;
use std::time::Duration;

pub(crate) async fn run_body<F, Fut>(cache: Option<(TaskCache, Duration)>, ctx: TaskCtx, f: F)
where
    F: FnOnce(TaskCtx) -> Fut,
    Fut: Future<Output = ()>,
{
    let Some((cache, ttl)) = cache else {
        f(ctx).await;
        return;
    };

    let key = ctx.key().clone();
    if !key.cacheable() {
        tracing::trace!(key = %key, "not a cache key");
        f(ctx).await;
        return;
    }

    if let Some(value) = cache.get(&key) {
        tracing::trace!(key = %key, "task result in cache");
        ctx.resolve(value);
        return;
    }

    tracing::trace!(key = %key, "task not in cache");
    f(ctx.clone()).await;

    match ctx.task.outcome() {
        Some(Ok(value)) => {
            tracing::trace!(key = %key, "task result to cache");
            cache.add(key, value, ttl);
        }
        Some(Err(err)) => {
            tracing::debug!(key = %key, error = %err, "failed task result not cached");
        }
        // Body returned without resolving; the runner records the error.
        None => {}
    }
}
