#![forbid(unsafe_code)]

use async_trait::async_trait;
use edusync_core::types::{
    AssignmentDoc, AssignmentStatus, FileDoc, GroupDoc, GroupMember, NotificationDoc,
    NotificationDraft, TaskDoc,
};
use time::OffsetDateTime;
use tokio::sync::mpsc;

pub mod memory;

pub use memory::MemoryStore;

/// Bounded depth per watcher. A consumer that falls this far behind is
/// evicted rather than allowed to block mutators.
pub const SNAPSHOT_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("group not found")]
    GroupNotFound,
    #[error("record not found")]
    RecordNotFound,
    #[error("already a member of this group")]
    AlreadyMember,
    #[error("not a member of this group")]
    NotAMember,
    #[error("transaction aborted")]
    Aborted,
    #[error("atomic batch cannot be guaranteed")]
    BatchNotAtomic,
    #[error("storage unavailable")]
    Unavailable,
    #[error("database error: {0}")]
    Database(String),
}

// ---------------------------------------------------------------------------
// Snapshot streams
// ---------------------------------------------------------------------------

/// A live watch over one query. Every emission is the **full current
/// result set** for that query (replace semantics, never a diff), in
/// mutation order for its topic. The first emission is the state at
/// registration time.
#[derive(Debug)]
pub struct SnapshotStream<T> {
    rx: mpsc::Receiver<Result<T, StoreError>>,
}

impl<T> SnapshotStream<T> {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Result<T, StoreError>>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn channel() -> (mpsc::Sender<Result<T, StoreError>>, Self) {
        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_SIZE);
        (tx, Self { rx })
    }

    /// Next snapshot, or `None` once the backing subscription is gone.
    pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// Creation payloads
// ---------------------------------------------------------------------------

/// Group creation input. The store assigns the id and `createdAt` and
/// seeds both rosters with the creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDraft {
    pub name: String,
    pub description: String,
    pub join_code: String,
    pub created_by: String,
    pub creator_name: String,
}

/// Assignment creation input. Denormalized group fields and the roster
/// snapshot are resolved by the caller at creation time; the store
/// assigns the id and `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDraft {
    pub title: String,
    pub description: String,
    pub due_at: OffsetDateTime,
    pub status: AssignmentStatus,
    pub created_by: String,
    pub group_name: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub created_by_uid: String,
    pub created_by_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDraft {
    pub file_name: String,
    pub storage_path: String,
    pub uploaded_by: String,
    pub uploaded_by_uid: String,
    pub provider: String,
    pub content_type: String,
    pub size: Option<i64>,
}

// ---------------------------------------------------------------------------
// Domain-specific storage traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Live membership query: groups whose `memberIds` contains `uid`,
    /// ordered by name. Emits a fresh full snapshot on every roster or
    /// group change.
    async fn watch_groups_for(
        &self,
        uid: &str,
    ) -> Result<SnapshotStream<Vec<GroupDoc>>, StoreError>;
    async fn get_group(&self, group_id: &str) -> Result<GroupDoc, StoreError>;
    async fn create_group(&self, draft: GroupDraft) -> Result<GroupDoc, StoreError>;
    async fn find_group_by_join_code(&self, join_code: &str) -> Result<GroupDoc, StoreError>;
    async fn join_group(&self, group_id: &str, member: GroupMember) -> Result<GroupDoc, StoreError>;
    /// Read-modify-write removal from both rosters.
    async fn leave_group(&self, group_id: &str, uid: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// One group's assignments ordered by due date ascending.
    async fn watch_assignments(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<AssignmentDoc>>, StoreError>;
    async fn create_assignment(
        &self,
        group_id: &str,
        draft: AssignmentDraft,
    ) -> Result<AssignmentDoc, StoreError>;
    async fn complete_assignment(
        &self,
        group_id: &str,
        assignment_id: &str,
    ) -> Result<AssignmentDoc, StoreError>;
}

#[async_trait]
pub trait GroupTaskStore: Send + Sync {
    /// One group's tasks ordered by creation time descending.
    async fn watch_tasks(&self, group_id: &str)
        -> Result<SnapshotStream<Vec<TaskDoc>>, StoreError>;
    async fn create_task(&self, group_id: &str, draft: TaskDraft) -> Result<TaskDoc, StoreError>;
    /// Advances todo → in_progress → done → todo.
    async fn advance_task(&self, group_id: &str, task_id: &str) -> Result<TaskDoc, StoreError>;
    async fn delete_task(&self, group_id: &str, task_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GroupFileStore: Send + Sync {
    /// One group's file records ordered by creation time descending.
    async fn watch_files(&self, group_id: &str)
        -> Result<SnapshotStream<Vec<FileDoc>>, StoreError>;
    async fn add_file(&self, group_id: &str, draft: FileDraft) -> Result<FileDoc, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// One user's notifications ordered by creation time descending.
    async fn watch_notifications(
        &self,
        uid: &str,
    ) -> Result<SnapshotStream<Vec<NotificationDoc>>, StoreError>;
    /// Writes every `(recipient uid, draft)` pair as ONE atomic batch:
    /// either all notifications exist afterwards or none do.
    async fn push_notifications(
        &self,
        batch: &[(String, NotificationDraft)],
    ) -> Result<(), StoreError>;
    async fn mark_read(&self, uid: &str, notification_id: &str) -> Result<(), StoreError>;
    /// Batch-deletes the user's notifications, returning how many were
    /// removed.
    async fn clear_notifications(&self, uid: &str) -> Result<usize, StoreError>;
}

/// Unified supertrait for code that needs access to all storage domains.
pub trait DocumentStore:
    GroupStore + AssignmentStore + GroupTaskStore + GroupFileStore + NotificationStore
{
}

impl<T> DocumentStore for T where
    T: GroupStore + AssignmentStore + GroupTaskStore + GroupFileStore + NotificationStore
{
}
