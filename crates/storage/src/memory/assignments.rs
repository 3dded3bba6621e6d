use async_trait::async_trait;
use edusync_core::types::{AssignmentDoc, AssignmentStatus};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{register, MemoryStore};
use crate::{AssignmentDraft, AssignmentStore, SnapshotStream, StoreError};

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn watch_assignments(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<AssignmentDoc>>, StoreError> {
        let mut state = self.state.write().await;
        let initial = state.assignments_for(group_id);
        Ok(register(&mut state.assignment_watchers, group_id, initial))
    }

    async fn create_assignment(
        &self,
        group_id: &str,
        draft: AssignmentDraft,
    ) -> Result<AssignmentDoc, StoreError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(group_id) {
            return Err(StoreError::GroupNotFound);
        }
        let doc = AssignmentDoc {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            due_at: draft.due_at,
            status: draft.status,
            created_at: OffsetDateTime::now_utc(),
            created_by: draft.created_by,
            completed_at: None,
            group_id: group_id.to_owned(),
            group_name: draft.group_name,
            member_ids: draft.member_ids,
        };
        state
            .assignments
            .entry(group_id.to_owned())
            .or_default()
            .insert(doc.id.clone(), doc.clone());
        state.emit_assignments(group_id);
        Ok(doc)
    }

    async fn complete_assignment(
        &self,
        group_id: &str,
        assignment_id: &str,
    ) -> Result<AssignmentDoc, StoreError> {
        let mut state = self.state.write().await;
        let doc = state
            .assignments
            .get_mut(group_id)
            .and_then(|records| records.get_mut(assignment_id))
            .ok_or(StoreError::RecordNotFound)?;
        doc.status = AssignmentStatus::Completed;
        doc.completed_at = Some(OffsetDateTime::now_utc());
        let doc = doc.clone();
        state.emit_assignments(group_id);
        Ok(doc)
    }
}
