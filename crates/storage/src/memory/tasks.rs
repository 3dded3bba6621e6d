use async_trait::async_trait;
use edusync_core::types::{TaskDoc, TaskStatus};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{register, MemoryStore};
use crate::{GroupTaskStore, SnapshotStream, StoreError, TaskDraft};

#[async_trait]
impl GroupTaskStore for MemoryStore {
    async fn watch_tasks(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<TaskDoc>>, StoreError> {
        let mut state = self.state.write().await;
        let initial = state.tasks_for(group_id);
        Ok(register(&mut state.task_watchers, group_id, initial))
    }

    async fn create_task(&self, group_id: &str, draft: TaskDraft) -> Result<TaskDoc, StoreError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(group_id) {
            return Err(StoreError::GroupNotFound);
        }
        let now = OffsetDateTime::now_utc();
        let doc = TaskDoc {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            status: TaskStatus::Todo,
            created_by_uid: draft.created_by_uid,
            created_by_name: draft.created_by_name,
            created_at: now,
            updated_at: now,
        };
        state
            .tasks
            .entry(group_id.to_owned())
            .or_default()
            .insert(doc.id.clone(), doc.clone());
        state.emit_tasks(group_id);
        Ok(doc)
    }

    async fn advance_task(&self, group_id: &str, task_id: &str) -> Result<TaskDoc, StoreError> {
        let mut state = self.state.write().await;
        let doc = state
            .tasks
            .get_mut(group_id)
            .and_then(|tasks| tasks.get_mut(task_id))
            .ok_or(StoreError::RecordNotFound)?;
        doc.status = doc.status.next();
        doc.updated_at = OffsetDateTime::now_utc();
        let doc = doc.clone();
        state.emit_tasks(group_id);
        Ok(doc)
    }

    async fn delete_task(&self, group_id: &str, task_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let removed = state
            .tasks
            .get_mut(group_id)
            .and_then(|tasks| tasks.remove(task_id));
        if removed.is_none() {
            return Err(StoreError::RecordNotFound);
        }
        state.emit_tasks(group_id);
        Ok(())
    }
}
