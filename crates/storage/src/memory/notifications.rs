use std::collections::HashSet;

use async_trait::async_trait;
use edusync_core::types::{NotificationDoc, NotificationDraft};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{register, MemoryStore};
use crate::{NotificationStore, SnapshotStream, StoreError};

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn watch_notifications(
        &self,
        uid: &str,
    ) -> Result<SnapshotStream<Vec<NotificationDoc>>, StoreError> {
        let mut state = self.state.write().await;
        let initial = state.notifications_for(uid);
        Ok(register(&mut state.notification_watchers, uid, initial))
    }

    async fn push_notifications(
        &self,
        batch: &[(String, NotificationDraft)],
    ) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;
        let created_at = OffsetDateTime::now_utc();
        let mut recipients = HashSet::new();
        for (uid, draft) in batch {
            let doc = NotificationDoc {
                id: Uuid::new_v4().to_string(),
                title: draft.title.clone(),
                message: draft.message.clone(),
                group_id: draft.group_id.clone(),
                kind: draft.kind,
                target: draft.target.clone(),
                read: draft.read,
                created_at,
            };
            state
                .notifications
                .entry(uid.clone())
                .or_default()
                .insert(doc.id.clone(), doc);
            recipients.insert(uid.clone());
        }
        for uid in recipients {
            state.emit_notifications(&uid);
        }
        Ok(())
    }

    async fn mark_read(&self, uid: &str, notification_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let doc = state
            .notifications
            .get_mut(uid)
            .and_then(|notifications| notifications.get_mut(notification_id))
            .ok_or(StoreError::RecordNotFound)?;
        doc.read = true;
        state.emit_notifications(uid);
        Ok(())
    }

    async fn clear_notifications(&self, uid: &str) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let removed = state
            .notifications
            .remove(uid)
            .map(|notifications| notifications.len())
            .unwrap_or(0);
        state.emit_notifications(uid);
        Ok(removed)
    }
}
