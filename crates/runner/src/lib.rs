//! Keyed task runner.
//!
//! Turns a `(key, body)` pair into a deduplicated, rate-limited,
//! time-bounded asynchronous computation:
//!
//! - concurrent `run` calls for the same key coalesce onto one task;
//! - admission is paced by a token-bucket limiter, the only ingress point;
//! - bodies run behind a panic boundary and an optional deadline;
//! - completion publishes the outcome once, cancels the task context and
//!   removes the registry entry;
//! - `Task::after` chains continuations that run only on success.
//!
//! Memoization between runs is the cache's job, not the registry's: a key
//! whose task has finished and been removed starts fresh, and the
//! [`with_cache`] decorator short-circuits it if a fresh result is stored.

mod task;
mod with_cache;

pub use task::{AfterCtx, Task, TaskCtx};

use futures::FutureExt;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use keyproofs_cache::TaskCache;
use keyproofs_core::{Error, TaskKey};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use task::panic_message;
use tokio_util::sync::CancellationToken;

/// Default pacing for task starts.
pub const DEFAULT_RATE_PER_SEC: u32 = 10;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Options applied to a task at `run` time. Runner defaults are applied
/// first, then per-call options; the last writer wins per field.
#[derive(Clone, Default)]
pub struct RunOptions {
    timeout: Option<Duration>,
    cache: Option<(TaskCache, Duration)>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the task with a deadline. Expiry rejects the task with
    /// [`Error::Timeout`] and cancels its context.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Serve and store results through `cache` with the given TTL.
    pub fn with_cache(mut self, cache: TaskCache, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    fn merge(mut self, over: RunOptions) -> Self {
        if over.timeout.is_some() {
            self.timeout = over.timeout;
        }
        if over.cache.is_some() {
            self.cache = over.cache;
        }
        self
    }
}

pub(crate) struct RunnerInner {
    registry: RwLock<HashMap<TaskKey, Task>>,
    limiter: DirectLimiter,
    root: CancellationToken,
    defaults: RunOptions,
}

/// Shared task runner. Cheap to clone.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

impl Runner {
    /// Create a runner pacing task starts at `rate_per_sec` with the given
    /// default options.
    pub fn new(rate_per_sec: u32, defaults: RunOptions) -> Self {
        let rate = NonZeroU32::new(rate_per_sec)
            .unwrap_or_else(|| NonZeroU32::new(DEFAULT_RATE_PER_SEC).expect("nonzero"));
        // Burst of one: strict pacing, matching the ingress contract of at
        // most rate+1 starts in any one-second window.
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::new(1).expect("nonzero"));

        Self {
            inner: Arc::new(RunnerInner {
                registry: RwLock::new(HashMap::new()),
                limiter: RateLimiter::direct(quota),
                root: CancellationToken::new(),
                defaults,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RunnerInner>) -> Self {
        Self { inner }
    }

    /// Schedule `f` under `key` with the runner's default options.
    ///
    /// If a task for `key` is already pending the existing handle is
    /// returned and `f` is dropped unrun.
    pub async fn run<F, Fut>(&self, key: TaskKey, f: F) -> Task
    where
        F: FnOnce(TaskCtx) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.run_with(key, f, RunOptions::new()).await
    }

    /// Schedule `f` under `key`, layering `opts` over the defaults.
    pub async fn run_with<F, Fut>(&self, key: TaskKey, f: F, opts: RunOptions) -> Task
    where
        F: FnOnce(TaskCtx) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Coalesce: readers on the fast path.
        {
            let registry = self.read_registry();
            if let Some(task) = registry.get(&key) {
                tracing::trace!(key = %key, "task found running");
                return task.clone();
            }
        }

        let opts = self.inner.defaults.clone().merge(opts);
        let token = self.inner.root.child_token();
        let task = Task::new(key.clone(), token.clone(), Arc::downgrade(&self.inner));

        // Install, or yield to a concurrent winner.
        {
            let mut registry = self.write_registry();
            match registry.entry(key.clone()) {
                Entry::Occupied(existing) => return existing.get().clone(),
                Entry::Vacant(slot) => {
                    slot.insert(task.clone());
                }
            }
        }

        // The only ingress-pacing point.
        self.inner.limiter.until_ready().await;

        // Deadline / cancellation watchdog. The body itself is never
        // aborted; it observes the token cooperatively, exactly like the
        // resolvers it wraps. finish() is idempotent, so a watchdog firing
        // after normal completion is a no-op.
        {
            let watched = task.clone();
            let token = token.clone();
            let timeout = opts.timeout;
            tokio::spawn(async move {
                match timeout {
                    Some(limit) => {
                        tokio::select! {
                            _ = tokio::time::sleep(limit) => {
                                if watched.finish(Err(Error::Timeout(limit))) {
                                    tracing::debug!(key = %watched.key(), ?limit, "task deadline exceeded");
                                }
                            }
                            _ = token.cancelled() => {
                                watched.finish(Err(Error::Cancelled));
                            }
                        }
                    }
                    None => {
                        token.cancelled().await;
                        watched.finish(Err(Error::Cancelled));
                    }
                }
            });
        }

        let runner = self.clone();
        let spawned = task.clone();
        let cache = opts.cache.clone();
        tokio::spawn(async move {
            tracing::trace!(key = %spawned.key(), "task running");

            let ctx = TaskCtx {
                task: spawned.clone(),
                runner: runner.clone(),
            };
            let body = with_cache::run_body(cache, ctx, f);
            if let Err(payload) = AssertUnwindSafe(body).catch_unwind().await {
                spawned.finish(Err(Error::Panic(panic_message(payload.as_ref()))));
            }

            // A body that returned without resolving still terminates.
            spawned.finish(Err(Error::Internal(
                "task body returned without a result".to_string(),
            )));

            match spawned.outcome() {
                Some(Ok(_)) => tracing::trace!(key = %spawned.key(), "task complete"),
                Some(Err(err)) => {
                    tracing::debug!(key = %spawned.key(), error = %err, "task failed")
                }
                None => unreachable!("task left unfinished"),
            }

            runner.remove(spawned.key(), &spawned);
        });

        task
    }

    /// Cancel the root context; every pending task finishes cancelled.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
    }

    /// Number of pending tasks in the registry.
    pub fn len(&self) -> usize {
        self.read_registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, key: &TaskKey, task: &Task) {
        let mut registry = self.write_registry();
        // Never evict a successor registered under the same key.
        if registry.get(key).is_some_and(|current| current.same_task(task)) {
            registry.remove(key);
        }
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TaskKey, Task>> {
        self.inner.registry.read().unwrap_or_else(|poisoned| {
            tracing::warn!("registry RwLock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_registry(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TaskKey, Task>> {
        self.inner.registry.write().unwrap_or_else(|poisoned| {
            tracing::warn!("registry RwLock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyproofs_core::{Proof, ProofStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn proof_value(uri: &str) -> Proof {
        Proof {
            uri: uri.to_string(),
            fingerprint: "ABCD".into(),
            icon: String::new(),
            service: "test".into(),
            name: String::new(),
            link: String::new(),
            verify_url: String::new(),
            status: ProofStatus::Verified,
        }
    }

    fn fast_runner() -> Runner {
        Runner::new(10_000, RunOptions::new())
    }

    #[tokio::test]
    async fn resolves_value_to_all_awaiters() {
        let runner = fast_runner();
        let task = runner
            .run(TaskKey::Proof("a".into()), |ctx| async move {
                ctx.resolve(proof_value("a"));
            })
            .await;

        let first = task.wait().await.unwrap();
        let second = task.wait().await.unwrap();
        assert_eq!(first.proof().unwrap().uri, "a");
        assert_eq!(second.proof().unwrap().uri, "a");
    }

    #[tokio::test]
    async fn concurrent_runs_share_one_task() {
        let runner = fast_runner();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let calls = calls.clone();
            let release_rx = release_rx.clone();
            let task = runner
                .run(TaskKey::Entity("id".into()), move |ctx| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(rx) = release_rx.lock().await.take() {
                        let _ = rx.await;
                    }
                    ctx.resolve(proof_value("done"));
                })
                .await;
            tasks.push(task);
        }

        assert_eq!(runner.len(), 1);
        let _ = release_tx.send(());
        for task in &tasks {
            task.wait().await.unwrap();
        }
        // The body ran exactly once for the installed task.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registry_cleans_up_after_finish() {
        let runner = fast_runner();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let task = runner
                .run(TaskKey::Entity("id".into()), move |ctx| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ctx.resolve(proof_value("x"));
                })
                .await;
            task.wait().await.unwrap();
            // Wait for the spawn to drop the registry entry.
            while runner.len() != 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        // Without a cache, a fresh task runs each time.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejection_skips_after_callbacks() {
        let runner = fast_runner();
        let ran = Arc::new(AtomicUsize::new(0));

        let task = runner
            .run(TaskKey::Entity("id".into()), |ctx| async move {
                ctx.reject(Error::NoFingerprint);
            })
            .await;

        let observed = ran.clone();
        task.after(move |_ctx| async move {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(task.wait().await.unwrap_err(), Error::NoFingerprint);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn after_observes_resolved_value() {
        let runner = fast_runner();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let task = runner
            .run(TaskKey::Proof("p".into()), |ctx| async move {
                ctx.resolve(proof_value("p"));
            })
            .await;

        task.after(move |ctx| {
            let tx = tx.lock().unwrap().take();
            async move {
                let uri = ctx.result().proof().unwrap().uri.clone();
                if let Some(tx) = tx {
                    let _ = tx.send(uri);
                }
            }
        });

        assert_eq!(rx.await.unwrap(), "p");
    }

    #[tokio::test]
    async fn after_can_schedule_dependent_tasks() {
        let runner = fast_runner();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let task = runner
            .run(TaskKey::Entity("id".into()), |ctx| async move {
                ctx.resolve(proof_value("parent"));
            })
            .await;

        task.after(move |ctx| async move {
            let child = ctx
                .run(TaskKey::Style("child".into()), |c| async move {
                    c.resolve(proof_value("child"));
                })
                .await
                .expect("runner alive");
            let value = child.wait().await.unwrap();
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(value.proof().unwrap().uri.clone());
            }
        });

        assert_eq!(rx.await.unwrap(), "child");
    }

    #[tokio::test]
    async fn panic_becomes_error_and_runner_survives() {
        let runner = fast_runner();
        let task = runner
            .run(TaskKey::Entity("boom".into()), |_ctx| async move {
                panic!("kaboom");
            })
            .await;

        match task.wait().await.unwrap_err() {
            Error::Panic(msg) => assert!(msg.contains("kaboom")),
            other => panic!("expected panic error, got {other:?}"),
        }

        // The runner still schedules new work.
        let ok = runner
            .run(TaskKey::Entity("fine".into()), |ctx| async move {
                ctx.resolve(proof_value("fine"));
            })
            .await;
        ok.wait().await.unwrap();
    }

    #[tokio::test]
    async fn body_without_result_rejects() {
        let runner = fast_runner();
        let task = runner
            .run(TaskKey::Entity("silent".into()), |_ctx| async move {})
            .await;
        assert!(matches!(task.wait().await.unwrap_err(), Error::Internal(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_and_cancels_context() {
        let runner = Runner::new(10_000, RunOptions::new().timeout(Duration::from_millis(50)));
        let task = runner
            .run(TaskKey::Entity("slow".into()), |ctx| async move {
                // Body only yields when its context is cancelled.
                ctx.token().cancelled().await;
            })
            .await;

        match task.wait().await.unwrap_err() {
            Error::Timeout(limit) => assert_eq!(limit, Duration::from_millis(50)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(task.token().is_cancelled());
    }

    #[tokio::test]
    async fn explicit_cancel_finishes_task() {
        let runner = fast_runner();
        let task = runner
            .run(TaskKey::Entity("held".into()), |ctx| async move {
                ctx.token().cancelled().await;
            })
            .await;

        task.cancel();
        assert_eq!(task.wait().await.unwrap_err(), Error::Cancelled);
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_tasks() {
        let runner = fast_runner();
        let task = runner
            .run(TaskKey::Entity("held".into()), |ctx| async move {
                ctx.token().cancelled().await;
            })
            .await;

        runner.shutdown();
        assert_eq!(task.wait().await.unwrap_err(), Error::Cancelled);
    }

    #[tokio::test]
    async fn rate_limiter_paces_starts() {
        // 10 per second, burst of one: the 6th start can't happen before
        // ~500ms have elapsed.
        let runner = Runner::new(10, RunOptions::new());
        let started = Instant::now();
        for i in 0..6 {
            runner
                .run(TaskKey::Proof(format!("p{i}")), |ctx| async move {
                    ctx.resolve(proof_value("x"));
                })
                .await;
        }
        assert!(
            started.elapsed() >= Duration::from_millis(400),
            "six starts finished in {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn cache_decorator_short_circuits_second_run() {
        let cache = TaskCache::new(16);
        let runner = Runner::new(
            10_000,
            RunOptions::new().with_cache(cache.clone(), Duration::from_secs(60)),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let task = runner
                .run(TaskKey::Proof("p".into()), move |ctx| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ctx.resolve(proof_value("p"));
                })
                .await;
            task.wait().await.unwrap();
            while runner.len() != 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&TaskKey::Proof("p".into())));
    }

    #[tokio::test]
    async fn cache_decorator_expires_entries() {
        let cache = TaskCache::new(16);
        let runner = Runner::new(
            10_000,
            RunOptions::new().with_cache(cache.clone(), Duration::from_millis(10)),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let task = runner
                .run(TaskKey::Proof("p".into()), move |ctx| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ctx.resolve(proof_value("p"));
                })
                .await;
            task.wait().await.unwrap();
            while runner.len() != 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = TaskCache::new(16);
        let runner = Runner::new(
            10_000,
            RunOptions::new().with_cache(cache.clone(), Duration::from_secs(60)),
        );

        let task = runner
            .run(TaskKey::Proof("bad".into()), |ctx| async move {
                ctx.reject(Error::NoFingerprint);
            })
            .await;
        let _ = task.wait().await;
        while runner.len() != 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(!cache.contains(&TaskKey::Proof("bad".into())));
    }

    #[tokio::test]
    async fn per_call_options_override_defaults() {
        let cache = TaskCache::new(16);
        let runner = Runner::new(
            10_000,
            RunOptions::new()
                .timeout(Duration::from_secs(30))
                .with_cache(cache.clone(), Duration::from_secs(60)),
        );

        // A tight per-call timeout beats the 30s default.
        let task = runner
            .run_with(
                TaskKey::Entity("slow".into()),
                |ctx| async move {
                    ctx.token().cancelled().await;
                },
                RunOptions::new().timeout(Duration::from_millis(20)),
            )
            .await;

        match task.wait().await.unwrap_err() {
            Error::Timeout(limit) => assert_eq!(limit, Duration::from_millis(20)),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
