use std::collections::{BTreeMap, HashMap};

use edusync_core::classify::{classify, Buckets, Deadline};
use edusync_core::types::{AssignmentDoc, AssignmentStatus};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// One assignment in the merged view, tagged with its owning group and
/// the display name cached when that group's feed started.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedAssignment {
    /// `{groupId}_{recordId}`, unique across the whole view, since
    /// record ids are only unique within a group.
    pub key: String,
    pub group_id: String,
    pub group_name: String,
    pub record: AssignmentDoc,
}

impl AggregatedAssignment {
    #[must_use]
    pub fn new(group_id: String, group_name: String, record: AssignmentDoc) -> Self {
        let key = format!("{group_id}_{}", record.id);
        Self {
            key,
            group_id,
            group_name,
            record,
        }
    }
}

impl Deadline for AggregatedAssignment {
    fn status(&self) -> AssignmentStatus {
        self.record.status
    }

    fn due_at(&self) -> OffsetDateTime {
        self.record.due_at
    }

    fn tie_id(&self) -> &str {
        &self.key
    }
}

/// Merged view over every live group feed, keyed by
/// `(groupId, recordId)`. The sole mutation entry points are `apply`,
/// `close_generation`, and `purge_all`; feeds authenticate their writes
/// with the generation issued when they were opened, so a callback from
/// a superseded subscription can never clobber newer data. One coarse
/// lock covers the whole map.
#[derive(Debug, Default)]
pub struct AggregationStore {
    inner: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: BTreeMap<(String, String), AggregatedAssignment>,
    generations: HashMap<String, u64>,
    next_generation: u64,
}

impl AggregationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the generation for a new feed on `group_id`. Any earlier
    /// generation for the same group becomes stale immediately.
    pub async fn open_generation(&self, group_id: &str) -> u64 {
        let mut state = self.inner.write().await;
        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(group_id.to_owned(), generation);
        generation
    }

    /// Replaces the group's slice with `records`: every existing
    /// `(group_id, *)` entry is deleted first, then the new set is
    /// inserted. Returns `false` without touching anything when
    /// `generation` has been superseded.
    pub async fn apply(
        &self,
        group_id: &str,
        generation: u64,
        records: Vec<AggregatedAssignment>,
    ) -> bool {
        let mut state = self.inner.write().await;
        if state.generations.get(group_id) != Some(&generation) {
            return false;
        }
        state.entries.retain(|(gid, _), _| gid != group_id);
        for record in records {
            state
                .entries
                .insert((group_id.to_owned(), record.record.id.clone()), record);
        }
        true
    }

    /// Tears down a feed's slice. A no-op if the generation has already
    /// been superseded; the newer feed owns the group now.
    pub async fn close_generation(&self, group_id: &str, generation: u64) {
        let mut state = self.inner.write().await;
        if state.generations.get(group_id) == Some(&generation) {
            state.generations.remove(group_id);
            state.entries.retain(|(gid, _), _| gid != group_id);
        }
    }

    /// Conservative degrade: drop everything rather than serve state
    /// whose membership is no longer known.
    pub async fn purge_all(&self) {
        let mut state = self.inner.write().await;
        state.generations.clear();
        state.entries.clear();
    }

    /// Cloned copy of the merged view, never a live reference.
    pub async fn snapshot(&self) -> Vec<AggregatedAssignment> {
        self.inner.read().await.entries.values().cloned().collect()
    }

    /// Classifies the current contents against `now`. Recomputed on
    /// every call, so a record crosses buckets purely by the clock
    /// advancing.
    pub async fn buckets(&self, now: OffsetDateTime) -> Buckets<AggregatedAssignment> {
        classify(self.snapshot().await, now)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
