//! Task handles and the contexts handed to task bodies and continuations.

use crate::{Runner, RunnerInner};
use futures::FutureExt;
use keyproofs_core::{Error, TaskKey, TaskValue};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) struct TaskShared {
    key: TaskKey,
    token: CancellationToken,
    outcome: OnceLock<Result<TaskValue, Error>>,
    done_tx: watch::Sender<bool>,
    runner: Weak<RunnerInner>,
}

/// Handle to a scheduled unit of work.
///
/// Cheap to clone; every clone observes the same terminal state. A task
/// transitions to finished exactly once, publishing either a value or an
/// error to all awaiters.
#[derive(Clone)]
pub struct Task {
    shared: Arc<TaskShared>,
}

impl Task {
    pub(crate) fn new(key: TaskKey, token: CancellationToken, runner: Weak<RunnerInner>) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(TaskShared {
                key,
                token,
                outcome: OnceLock::new(),
                done_tx,
                runner,
            }),
        }
    }

    pub fn key(&self) -> &TaskKey {
        &self.shared.key
    }

    /// This task's cancellation token. Cancelled when the task finishes,
    /// when it is cancelled explicitly, or when the runner shuts down.
    pub fn token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// The terminal state, if the task has reached one.
    pub fn outcome(&self) -> Option<Result<TaskValue, Error>> {
        self.shared.outcome.get().cloned()
    }

    /// Record the terminal state. First caller wins; the context is
    /// cancelled and the done signal raised exactly once.
    pub(crate) fn finish(&self, outcome: Result<TaskValue, Error>) -> bool {
        if self.shared.outcome.set(outcome).is_err() {
            return false;
        }
        self.shared.token.cancel();
        let _ = self.shared.done_tx.send(true);
        true
    }

    /// Record a cancellation error and finish. In-flight work observing the
    /// token aborts cooperatively; awaiters see [`Error::Cancelled`].
    pub fn cancel(&self) {
        if self.finish(Err(Error::Cancelled)) {
            tracing::debug!(key = %self.shared.key, "task cancelled");
        }
    }

    /// Wait for the terminal state.
    pub async fn wait(&self) -> Result<TaskValue, Error> {
        let mut rx = self.shared.done_tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
        self.shared
            .outcome
            .get()
            .cloned()
            .expect("done signalled before outcome was published")
    }

    /// Schedule `f` to run once this task resolves successfully. On
    /// rejection the callback is silently skipped. Callbacks for the same
    /// task may run in parallel with one another; a successful `resolve`
    /// happens-before any callback observing the value.
    pub fn after<F, Fut>(&self, f: F)
    where
        F: FnOnce(AfterCtx) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = self.clone();
        tokio::spawn(async move {
            if task.wait().await.is_err() {
                return;
            }
            let ctx = AfterCtx { task: task.clone() };
            if let Err(payload) = AssertUnwindSafe(f(ctx)).catch_unwind().await {
                tracing::error!(
                    key = %task.shared.key,
                    panic = %panic_message(payload.as_ref()),
                    "after callback panicked"
                );
            }
        });
    }

    pub(crate) fn runner(&self) -> Option<Runner> {
        self.shared.runner.upgrade().map(Runner::from_inner)
    }

    pub(crate) fn same_task(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// The handle a task body receives (`Q` in the promise protocol): identity,
/// context, completion, and the runner itself so bodies can spawn siblings.
#[derive(Clone)]
pub struct TaskCtx {
    pub(crate) task: Task,
    pub(crate) runner: Runner,
}

impl TaskCtx {
    pub fn key(&self) -> &TaskKey {
        self.task.key()
    }

    pub fn token(&self) -> CancellationToken {
        self.task.token()
    }

    /// Publish a successful result. A no-op if the task already finished.
    pub fn resolve(&self, value: impl Into<TaskValue>) {
        self.task.finish(Ok(value.into()));
    }

    /// Publish a failure. A no-op if the task already finished.
    pub fn reject(&self, err: Error) {
        self.task.finish(Err(err));
    }

    /// Schedule another task on the same runner.
    pub async fn run<F, Fut>(&self, key: TaskKey, f: F) -> Task
    where
        F: FnOnce(TaskCtx) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.runner.run(key, f).await
    }
}

/// The handle an `after` continuation receives (`ResultQ`): the parent's
/// key and value, its context read lazily, and the runner for scheduling
/// dependent work.
#[derive(Clone)]
pub struct AfterCtx {
    task: Task,
}

impl AfterCtx {
    pub fn key(&self) -> &TaskKey {
        self.task.key()
    }

    /// The parent's resolved value. Continuations only run on success.
    pub fn result(&self) -> TaskValue {
        match self.task.outcome() {
            Some(Ok(value)) => value,
            _ => unreachable!("after callbacks only run on success"),
        }
    }

    /// The parent task's token, read lazily so cancellation mid-chain is
    /// observed.
    pub fn token(&self) -> CancellationToken {
        self.task.token()
    }

    /// Schedule a task on the parent's runner. Returns `None` if the runner
    /// has shut down.
    pub async fn run<F, Fut>(&self, key: TaskKey, f: F) -> Option<Task>
    where
        F: FnOnce(TaskCtx) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.task.runner() {
            Some(runner) => Some(runner.run(key, f).await),
            None => {
                tracing::debug!(key = %key, "runner gone, skipping dependent task");
                None
            }
        }
    }
}
