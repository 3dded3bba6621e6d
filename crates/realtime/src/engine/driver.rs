use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use edusync_core::classify::Buckets;

use super::feeds::FeedPool;
use super::status::EngineStatus;
use super::storage::EngineStorage;
use super::store::{AggregatedAssignment, AggregationStore};
use super::watcher::DiffTracker;

/// Drives the merged assignments view for one signed-in user: watches
/// group membership, keeps one feed per group, and owns the aggregation
/// store the feeds write into.
pub struct AssignmentEngine {
    storage: Arc<dyn EngineStorage>,
}

impl AssignmentEngine {
    #[must_use]
    pub fn new(storage: Arc<dyn EngineStorage>) -> Self {
        Self { storage }
    }

    /// Spawns the engine for `uid` and returns its handle. Dropping the
    /// handle stops the engine; prefer `stop` for a deterministic
    /// teardown.
    #[must_use]
    pub fn spawn(&self, uid: impl Into<String>) -> EngineHandle {
        let uid = uid.into();
        let store = Arc::new(AggregationStore::new());
        let (status_tx, status_rx) = watch::channel(EngineStatus::Starting);
        let status_tx = Arc::new(status_tx);
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(run_engine(
            Arc::clone(&self.storage),
            Arc::clone(&store),
            Arc::clone(&status_tx),
            Arc::clone(&shutdown),
            uid,
        ));

        EngineHandle {
            store,
            status: status_rx,
            shutdown,
            task: Some(task),
        }
    }
}

pub struct EngineHandle {
    store: Arc<AggregationStore>,
    status: watch::Receiver<EngineStatus>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    #[must_use]
    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// Waits for the next status transition and returns it. `None` once
    /// the engine has stopped.
    pub async fn status_changed(&mut self) -> Option<EngineStatus> {
        self.status.changed().await.ok()?;
        Some(self.status.borrow_and_update().clone())
    }

    /// Classifies the current merged view against `now`.
    pub async fn buckets(&self, now: OffsetDateTime) -> Buckets<AggregatedAssignment> {
        self.store.buckets(now).await
    }

    /// Stops the engine and waits for every feed to be torn down.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn run_engine(
    storage: Arc<dyn EngineStorage>,
    store: Arc<AggregationStore>,
    status: Arc<watch::Sender<EngineStatus>>,
    shutdown: Arc<Notify>,
    uid: String,
) {
    let mut pool = FeedPool::new(Arc::clone(&storage), Arc::clone(&store), Arc::clone(&status));
    let mut tracker = DiffTracker::new();

    let mut stream = match storage.watch_groups_for(&uid).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%uid, %error, "group membership subscription failed");
            status.send_replace(EngineStatus::degraded(format!(
                "group membership subscription failed: {error}"
            )));
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            update = stream.next() => match update {
                None => break,
                Some(Ok(groups)) => {
                    let diff = tracker.observe(groups.iter().map(|group| group.id.as_str()));
                    // Status first: feeds spawned below may degrade it,
                    // and that report must not be overwritten here.
                    status.send_replace(EngineStatus::Live {
                        groups: tracker.len(),
                    });
                    pool.reconcile(diff).await;
                }
                Some(Err(error)) => {
                    tracing::error!(%uid, %error, "group membership snapshot failed");
                    // Conservative degrade: tear everything down rather
                    // than keep stale membership.
                    let diff = tracker.clear();
                    pool.reconcile(diff).await;
                    store.purge_all().await;
                    status.send_replace(EngineStatus::degraded(format!(
                        "group membership snapshot failed: {error}"
                    )));
                }
            }
        }
    }

    pool.shutdown().await;
}
