//! Completion pipeline (§4.C): a value promise driven by a worker pool.
//!
//! Construction variants map to tagged `CompletionKind`s over a uniform
//! poll/then/cancel/progress interface (§9 design notes).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};

use crate::error::CephadmError;

type BoxedJob = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Serializes callback execution. Size 1 (the default) makes the pool a
/// de-facto lock: scheduled callbacks run in strict submission order (§5, §9).
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<BoxedJob>,
}

impl WorkerPool {
    /// Spawn `size` worker loops draining a shared queue. `size` is clamped
    /// to at least 1.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<BoxedJob>();
        let rx = Arc::new(AsyncMutex::new(rx));

        for _ in 0..size.max(1) {
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => job().await,
                        None => break,
                    }
                }
            });
        }

        Self { tx }
    }

    /// Schedule a job; returns immediately, the job runs on a worker loop.
    pub fn submit<F, Fut>(&self, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: BoxedJob = Box::new(move || Box::pin(job()));
        // The only failure mode is every worker loop having been dropped,
        // which happens solely at engine shutdown.
        let _ = self.tx.send(boxed);
    }
}

/// Which construction variant produced a completion; execution semantics
/// live in the shared state machine, this is for diagnostics/logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Value already known at construction time
    Trivial,
    /// Single call scheduled on the pool
    Async,
    /// Callback applied element-wise via the pool, `many` flag set
    AsyncMap,
    /// `a.then(b)`: `b` runs after `a` resolves, consuming its result
    Chain,
}

/// Lifecycle state: `pending -> running -> {resolved, failed, cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Pending,
    Running,
    Resolved,
    Failed,
    Cancelled,
}

impl CompletionStatus {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            CompletionStatus::Resolved | CompletionStatus::Failed | CompletionStatus::Cancelled
        )
    }
}

struct Shared<T> {
    status: AsyncMutex<CompletionStatus>,
    result: AsyncMutex<Option<Result<T, CephadmError>>>,
    progress: AsyncMutex<f64>,
    notify: Notify,
    cancelled: AtomicBool,
}

impl<T> Shared<T> {
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            status: AsyncMutex::new(CompletionStatus::Pending),
            result: AsyncMutex::new(None),
            progress: AsyncMutex::new(0.0),
            notify: Notify::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    async fn settle(&self, status: CompletionStatus, result: Result<T, CephadmError>) {
        *self.result.lock().await = Some(result);
        *self.status.lock().await = status;
        self.notify.notify_waiters();
    }
}

/// A value promise: constructed via [`Completion::trivial`],
/// [`Completion::spawn_async`], [`Completion::spawn_async_map`], or
/// [`Completion::then`].
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
    kind: CompletionKind,
}

impl<T: Send + 'static> Completion<T> {
    /// A completion whose value is already known
    #[must_use]
    pub fn trivial(value: T) -> Self {
        let shared = Shared::pending();
        // Freshly constructed and not yet shared with any other task, so
        // these mutexes are uncontended and `try_lock` always succeeds.
        *shared
            .status
            .try_lock()
            .expect("freshly constructed completion mutex is uncontended") = CompletionStatus::Resolved;
        *shared
            .result
            .try_lock()
            .expect("freshly constructed completion mutex is uncontended") = Some(Ok(value));
        *shared
            .progress
            .try_lock()
            .expect("freshly constructed completion mutex is uncontended") = 1.0;

        Self {
            shared,
            kind: CompletionKind::Trivial,
        }
    }

    /// Schedule a single call on `pool`
    pub fn spawn_async<F, Fut>(pool: &WorkerPool, update_progress: bool, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CephadmError>> + Send + 'static,
    {
        let shared = Shared::pending();
        let inner = shared.clone();
        pool.submit(move || async move {
            if inner.cancelled.load(Ordering::SeqCst) {
                *inner.status.lock().await = CompletionStatus::Cancelled;
                inner.notify.notify_waiters();
                return;
            }
            *inner.status.lock().await = CompletionStatus::Running;
            let result = f().await;
            if update_progress && result.is_ok() {
                *inner.progress.lock().await = 1.0;
            }
            let status = if result.is_ok() {
                CompletionStatus::Resolved
            } else {
                CompletionStatus::Failed
            };
            inner.settle(status, result).await;
        });
        Self {
            shared,
            kind: CompletionKind::Async,
        }
    }

    /// `a.then(b)`: `b` consumes `a`'s resolved value; if `a` fails or is
    /// cancelled, the chain short-circuits without running `b`.
    pub fn then<U, F, Fut>(self, pool: &WorkerPool, f: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, CephadmError>> + Send + 'static,
    {
        let out = Shared::pending();
        let out_inner = out.clone();
        let parent = self.shared;

        pool.submit(move || async move {
            loop {
                let done = { parent.status.lock().await.is_terminal() };
                if done {
                    break;
                }
                parent.notify.notified().await;
            }

            let parent_result = parent.result.lock().await.take();
            match parent_result {
                Some(Ok(value)) => {
                    if out_inner.cancelled.load(Ordering::SeqCst) {
                        *out_inner.status.lock().await = CompletionStatus::Cancelled;
                        out_inner.notify.notify_waiters();
                        return;
                    }
                    *out_inner.status.lock().await = CompletionStatus::Running;
                    let result = f(value).await;
                    let status = if result.is_ok() {
                        CompletionStatus::Resolved
                    } else {
                        CompletionStatus::Failed
                    };
                    out_inner.settle(status, result).await;
                }
                Some(Err(e)) => {
                    out_inner.settle(CompletionStatus::Failed, Err(e)).await;
                }
                None => {
                    *out_inner.status.lock().await = CompletionStatus::Cancelled;
                    out_inner.notify.notify_waiters();
                }
            }
        });

        Completion {
            shared: out,
            kind: CompletionKind::Chain,
        }
    }

    /// Current status, without blocking
    pub async fn poll(&self) -> CompletionStatus {
        *self.shared.status.lock().await
    }

    /// Current progress, `0.0..=1.0`
    pub async fn progress(&self) -> f64 {
        *self.shared.progress.lock().await
    }

    /// Mark cancelled; cooperative — in-flight work finishes, no dependent
    /// chain link is scheduled past this point.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }

    /// Which construction variant produced this completion
    #[must_use]
    pub fn kind(&self) -> CompletionKind {
        self.kind
    }

    /// Wait for resolution and consume the result. A completion's result is
    /// observed exactly once: this method takes ownership of `self`.
    ///
    /// # Errors
    /// Returns the callback's error, or `CephadmError::ActorError` if the
    /// completion was cancelled before producing a value.
    pub async fn wait(self) -> Result<T, CephadmError> {
        loop {
            let done = { self.shared.status.lock().await.is_terminal() };
            if done {
                break;
            }
            self.shared.notify.notified().await;
        }
        let mut result = self.shared.result.lock().await;
        result
            .take()
            .unwrap_or_else(|| Err(CephadmError::ActorError("completion was cancelled".to_string())))
    }
}

impl<T: Send + 'static> Completion<Vec<T>> {
    /// Apply `f` element-wise via `pool`'s map-async (`many` flag set).
    /// Progress advances by `1/len` per completed element when
    /// `update_progress` is set.
    pub fn spawn_async_map<I, F, Fut>(
        pool: &WorkerPool,
        update_progress: bool,
        items: Vec<I>,
        f: F,
    ) -> Self
    where
        I: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CephadmError>> + Send + 'static,
    {
        let shared = Shared::pending();
        let inner = shared.clone();
        let len = items.len().max(1);
        let f = Arc::new(f);

        pool.submit(move || async move {
            *inner.status.lock().await = CompletionStatus::Running;
            let mut out = Vec::with_capacity(items.len());

            for item in items {
                if inner.cancelled.load(Ordering::SeqCst) {
                    *inner.status.lock().await = CompletionStatus::Cancelled;
                    inner.notify.notify_waiters();
                    return;
                }
                match f(item).await {
                    Ok(value) => {
                        out.push(value);
                        if update_progress {
                            let mut progress = inner.progress.lock().await;
                            *progress += 1.0 / len as f64;
                        }
                    }
                    Err(e) => {
                        inner.settle(CompletionStatus::Failed, Err(e)).await;
                        return;
                    }
                }
            }

            inner.settle(CompletionStatus::Resolved, Ok(out)).await;
        });

        Self {
            shared,
            kind: CompletionKind::AsyncMap,
        }
    }
}

/// Drive a batch of owned completions to finalization, awaiting each in
/// turn — the serve loop's `process([...])`.
pub async fn process<T: Send + 'static>(completions: Vec<Completion<T>>) -> Vec<Result<T, CephadmError>> {
    let mut results = Vec::with_capacity(completions.len());
    for completion in completions {
        results.push(completion.wait().await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trivial_completion_resolves_immediately() {
        let completion = Completion::trivial(42);
        assert_eq!(completion.poll().await, CompletionStatus::Resolved);
        assert_eq!(completion.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn async_completion_runs_on_pool() {
        let pool = WorkerPool::new(1);
        let completion = Completion::spawn_async(&pool, false, || async { Ok::<_, CephadmError>(7) });
        assert_eq!(completion.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn chain_passes_value_through() {
        let pool = WorkerPool::new(1);
        let a = Completion::spawn_async(&pool, false, || async { Ok::<_, CephadmError>(3) });
        let b = a.then(&pool, |v| async move { Ok::<_, CephadmError>(v * 2) });
        assert_eq!(b.wait().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn chain_short_circuits_on_parent_failure() {
        let pool = WorkerPool::new(1);
        let a: Completion<i32> =
            Completion::spawn_async(&pool, false, || async { Err(CephadmError::Timeout) });
        let b = a.then(&pool, |v| async move { Ok::<_, CephadmError>(v * 2) });
        assert!(b.wait().await.is_err());
    }

    #[tokio::test]
    async fn async_map_applies_elementwise_and_advances_progress() {
        let pool = WorkerPool::new(1);
        let items = vec![1, 2, 3];
        let completion =
            Completion::spawn_async_map(&pool, true, items, |n| async move { Ok::<_, CephadmError>(n * n) });
        let result = completion.wait().await.unwrap();
        assert_eq!(result, vec![1, 4, 9]);
    }

    #[tokio::test]
    async fn size_one_pool_preserves_submission_order() {
        let pool = WorkerPool::new(1);
        let log = Arc::new(AsyncMutex::new(Vec::new()));

        let mut completions = Vec::new();
        for i in 0..5 {
            let log = log.clone();
            completions.push(Completion::spawn_async(&pool, false, move || async move {
                log.lock().await.push(i);
                Ok::<_, CephadmError>(i)
            }));
        }

        for completion in completions {
            let _ = completion.wait().await;
        }

        assert_eq!(*log.lock().await, vec![0, 1, 2, 3, 4]);
    }
}
