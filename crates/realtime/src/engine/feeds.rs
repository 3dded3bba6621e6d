use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::status::EngineStatus;
use super::storage::EngineStorage;
use super::store::{AggregatedAssignment, AggregationStore};
use super::watcher::MembershipDiff;

/// Display name used when the one-shot group lookup fails at feed start.
const FALLBACK_GROUP_NAME: &str = "Group";

/// One live feed task per group in the watched membership set.
pub(super) struct FeedPool {
    storage: Arc<dyn EngineStorage>,
    store: Arc<AggregationStore>,
    status: Arc<watch::Sender<EngineStatus>>,
    feeds: HashMap<String, Feed>,
}

struct Feed {
    generation: u64,
    task: JoinHandle<()>,
}

impl FeedPool {
    pub(super) fn new(
        storage: Arc<dyn EngineStorage>,
        store: Arc<AggregationStore>,
        status: Arc<watch::Sender<EngineStatus>>,
    ) -> Self {
        Self {
            storage,
            store,
            status,
            feeds: HashMap::new(),
        }
    }

    /// Applies a membership diff. Removals run first and purge the
    /// group's rows before this returns, so a removed group is gone
    /// before the next bucket read. Additions open a fresh generation,
    /// which also invalidates any in-flight callback from a feed the
    /// same group had before.
    pub(super) async fn reconcile(&mut self, diff: MembershipDiff) {
        for group_id in &diff.removed {
            if let Some(feed) = self.feeds.remove(group_id) {
                feed.task.abort();
                self.store.close_generation(group_id, feed.generation).await;
            }
        }

        for group_id in diff.added {
            if self.feeds.contains_key(&group_id) {
                continue;
            }
            let generation = self.store.open_generation(&group_id).await;
            let task = tokio::spawn(run_feed(
                Arc::clone(&self.storage),
                Arc::clone(&self.store),
                Arc::clone(&self.status),
                group_id.clone(),
                generation,
            ));
            self.feeds.insert(group_id, Feed { generation, task });
        }
    }

    pub(super) async fn shutdown(&mut self) {
        let feeds = std::mem::take(&mut self.feeds);
        for (group_id, feed) in feeds {
            feed.task.abort();
            self.store.close_generation(&group_id, feed.generation).await;
        }
    }
}

async fn run_feed(
    storage: Arc<dyn EngineStorage>,
    store: Arc<AggregationStore>,
    status: Arc<watch::Sender<EngineStatus>>,
    group_id: String,
    generation: u64,
) {
    // Resolved once per feed; a group rename while subscribed keeps the
    // old label until the feed restarts.
    let group_name = match storage.get_group(&group_id).await {
        Ok(group) => group.name,
        Err(error) => {
            tracing::error!(group_id = %group_id, %error, "group lookup failed at feed start");
            FALLBACK_GROUP_NAME.to_owned()
        }
    };

    let mut stream = match storage.watch_assignments(&group_id).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(group_id = %group_id, %error, "assignment subscription failed");
            status.send_replace(EngineStatus::degraded(format!(
                "assignment subscription for group {group_id} failed: {error}"
            )));
            store.apply(&group_id, generation, Vec::new()).await;
            return;
        }
    };

    while let Some(update) = stream.next().await {
        match update {
            Ok(records) => {
                let tagged = records
                    .into_iter()
                    .map(|record| {
                        AggregatedAssignment::new(group_id.clone(), group_name.clone(), record)
                    })
                    .collect();
                if !store.apply(&group_id, generation, tagged).await {
                    // Superseded by a newer feed for the same group.
                    return;
                }
            }
            Err(error) => {
                tracing::error!(group_id = %group_id, %error, "assignment snapshot failed");
                status.send_replace(EngineStatus::degraded(format!(
                    "assignment snapshot for group {group_id} failed: {error}"
                )));
                store.apply(&group_id, generation, Vec::new()).await;
            }
        }
    }
}
