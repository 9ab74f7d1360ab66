//! # Download task manager
//!
//! Keeps at most one fetch+place pipeline running per [`CacheKey`]. The
//! registry entry for a key exists exactly from the moment its task is
//! started until the pipeline has finished, whatever the outcome, so the
//! next miss after a failure starts a fresh attempt.
//!
//! The registry lock is only held to check-and-insert or to remove an
//! entry; no I/O happens under it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::FailurePolicy;
use crate::error::{PlaceError, PullError};
use crate::origin::{CacheKey, CachePath};
use crate::pipeline::Pipeline;

/// How a download task ended
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed,
    Failed(PullError),
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }
}

type OutcomeSlot = Option<TaskOutcome>;

#[derive(Debug)]
struct DownloadTask {
    id: u64,
    path: CachePath,
    started_at: Instant,
    done: watch::Receiver<OutcomeSlot>,
}

/// Awaitable handle on a running task
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    rx: watch::Receiver<OutcomeSlot>,
}

impl TaskCompletion {
    /// Resolves once the task has been removed from the registry.
    pub async fn wait(mut self) -> TaskOutcome {
        let outcome = match self.rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            TaskOutcome::Failed(PullError::Aborted(
                "task ended without reporting an outcome".to_string(),
            ))
        })
    }
}

/// Decides what a failed task means for the rest of the process
#[derive(Debug, Clone)]
pub struct Supervisor {
    policy: FailurePolicy,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(policy: FailurePolicy, shutdown: CancellationToken) -> Self {
        Self { policy, shutdown }
    }

    pub fn report(&self, key: &CacheKey, path: &CachePath, err: &PullError) {
        if let PullError::Placement(PlaceError::RemoveSource { .. }) = err {
            warn!(
                url = %key,
                path = %path,
                error = %err,
                "Cached file placed, temporary copy left behind"
            );
            return;
        }
        if !err.is_fatal() {
            warn!(url = %key, path = %path, error = %err, "Download task failed");
            return;
        }

        error!(url = %key, path = %path, error = %err, "Failed to place download into cache");
        if self.policy == FailurePolicy::FailFast {
            error!("Fail-fast policy in effect, shutting down");
            self.shutdown.cancel();
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(FailurePolicy::default(), CancellationToken::new())
    }
}

pub struct TaskManager {
    tasks: Mutex<HashMap<CacheKey, DownloadTask>>,
    next_id: AtomicU64,
    pipeline: Arc<dyn Pipeline>,
    supervisor: Supervisor,
}

impl TaskManager {
    pub fn new(pipeline: Arc<dyn Pipeline>, supervisor: Supervisor) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            pipeline,
            supervisor,
        })
    }

    /// Start a download task for `key` unless one is already running.
    ///
    /// Returns `true` when a new task was started. Must be called from
    /// within a tokio runtime.
    pub fn ensure_task(self: &Arc<Self>, path: CachePath, key: CacheKey) -> bool {
        let (tx, rx) = watch::channel(None);
        let id = {
            let mut tasks = self.tasks.lock();
            if let Some(existing) = tasks.get(&key) {
                debug!(
                    url = %key,
                    elapsed = ?existing.started_at.elapsed(),
                    "Download task already running"
                );
                return false;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            tasks.insert(
                key.clone(),
                DownloadTask {
                    id,
                    path: path.clone(),
                    started_at: Instant::now(),
                    done: rx,
                },
            );
            id
        };

        info!(url = %key, path = %path, "Created download task");

        let pipeline = Arc::clone(&self.pipeline);
        let run = {
            let key = key.clone();
            let path = path.clone();
            tokio::spawn(async move { pipeline.run(&key, &path).await })
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match run.await {
                Ok(Ok(())) => TaskOutcome::Completed,
                Ok(Err(e)) => TaskOutcome::Failed(e),
                Err(e) => TaskOutcome::Failed(PullError::Aborted(e.to_string())),
            };
            manager.finish(id, &key, outcome, tx);
        });

        true
    }

    fn finish(
        &self,
        id: u64,
        key: &CacheKey,
        outcome: TaskOutcome,
        tx: watch::Sender<OutcomeSlot>,
    ) {
        let removed = {
            let mut tasks = self.tasks.lock();
            match tasks.get(key) {
                Some(task) if task.id == id => tasks.remove(key),
                _ => None,
            }
        };

        let Some(task) = removed else {
            // Only this task's waiter ever removes its entry.
            error!(url = %key, id, "Download task missing from registry at completion");
            let _ = tx.send(Some(outcome));
            return;
        };

        match &outcome {
            TaskOutcome::Completed => {
                info!(url = %key, elapsed = ?task.started_at.elapsed(), "Download task finished");
            }
            TaskOutcome::Failed(e) => self.supervisor.report(key, &task.path, e),
        }

        let _ = tx.send(Some(outcome));
    }

    /// Handle to await the running task for `key`, if any.
    pub fn completion(&self, key: &CacheKey) -> Option<TaskCompletion> {
        self.tasks.lock().get(key).map(|task| TaskCompletion {
            rx: task.done.clone(),
        })
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.tasks.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}
