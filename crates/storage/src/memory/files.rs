use async_trait::async_trait;
use edusync_core::types::FileDoc;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{register, MemoryStore};
use crate::{FileDraft, GroupFileStore, SnapshotStream, StoreError};

#[async_trait]
impl GroupFileStore for MemoryStore {
    async fn watch_files(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<FileDoc>>, StoreError> {
        let mut state = self.state.write().await;
        let initial = state.files_for(group_id);
        Ok(register(&mut state.file_watchers, group_id, initial))
    }

    async fn add_file(&self, group_id: &str, draft: FileDraft) -> Result<FileDoc, StoreError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(group_id) {
            return Err(StoreError::GroupNotFound);
        }
        let doc = FileDoc {
            id: Uuid::new_v4().to_string(),
            file_name: draft.file_name,
            storage_path: draft.storage_path,
            url: String::new(),
            uploaded_by: draft.uploaded_by,
            uploaded_by_uid: draft.uploaded_by_uid,
            created_at: OffsetDateTime::now_utc(),
            provider: draft.provider,
            content_type: draft.content_type,
            size: draft.size,
        };
        state
            .files
            .entry(group_id.to_owned())
            .or_default()
            .insert(doc.id.clone(), doc.clone());
        state.emit_files(group_id);
        Ok(doc)
    }
}
