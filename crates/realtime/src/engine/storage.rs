use async_trait::async_trait;
use edusync_core::types::{AssignmentDoc, GroupDoc};
use edusync_storage::{AssignmentStore, GroupStore, SnapshotStream, StoreError};

/// The slice of storage the engine needs: the membership watch, one-shot
/// group lookups for display names, and per-group assignment watches.
/// Any full document store satisfies it through the blanket impl.
#[async_trait]
pub trait EngineStorage: Send + Sync {
    async fn watch_groups_for(
        &self,
        uid: &str,
    ) -> Result<SnapshotStream<Vec<GroupDoc>>, StoreError>;
    async fn get_group(&self, group_id: &str) -> Result<GroupDoc, StoreError>;
    async fn watch_assignments(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<AssignmentDoc>>, StoreError>;
}

#[async_trait]
impl<T> EngineStorage for T
where
    T: GroupStore + AssignmentStore + Send + Sync,
{
    async fn watch_groups_for(
        &self,
        uid: &str,
    ) -> Result<SnapshotStream<Vec<GroupDoc>>, StoreError> {
        GroupStore::watch_groups_for(self, uid).await
    }

    async fn get_group(&self, group_id: &str) -> Result<GroupDoc, StoreError> {
        GroupStore::get_group(self, group_id).await
    }

    async fn watch_assignments(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<AssignmentDoc>>, StoreError> {
        AssignmentStore::watch_assignments(self, group_id).await
    }
}
