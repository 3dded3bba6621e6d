use std::sync::Arc;

use edusync_bridge::{BridgeError, CapabilityBridge};
use edusync_core::auth::AuthContext;
use edusync_core::classify::initial_status;
use edusync_core::types::{
    AssignmentDoc, FileDoc, GroupDoc, GroupMember, GroupTab, MemberRole, NotificationDoc,
    NotificationKind, NotificationTarget, TaskDoc,
};
use edusync_core::validation::{
    generate_join_code, normalize_join_code, validate_file_name, validate_group_name,
    validate_title, ValidationError,
};
use edusync_notify::{notify_group_members, FanoutConfig, FanoutError, FanoutRequest};
use edusync_realtime::{AssignmentEngine, EngineHandle, EngineStorage};
use edusync_storage::{
    AssignmentDraft, AssignmentStore, DocumentStore, FileDraft, GroupDraft, GroupFileStore,
    GroupStore, GroupTaskStore, NotificationStore, SnapshotStream, StoreError, TaskDraft,
};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("not signed in")]
    Unauthorized,
    #[error("file storage bridge is not configured")]
    BridgeDisabled,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fanout(#[from] FanoutError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub due_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
}

/// User-facing operations over one signed-in identity: groups,
/// assignments, tasks, files, and notifications. Nothing is applied
/// optimistically: a failed mutation leaves no local trace, and a
/// fanout failure after a successful primary write is surfaced to the
/// caller rather than swallowed.
pub struct Client<S> {
    storage: Arc<S>,
    bridge: Option<CapabilityBridge>,
    fanout: FanoutConfig,
    auth: Mutex<Option<AuthContext>>,
}

impl<S> Client<S>
where
    S: DocumentStore + 'static,
{
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            bridge: None,
            fanout: FanoutConfig::default(),
            auth: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_config(storage: Arc<S>, config: &AppConfig) -> Self {
        Self {
            storage,
            bridge: config.build_bridge(),
            fanout: config.fanout,
            auth: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_bridge(mut self, bridge: CapabilityBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    #[must_use]
    pub fn with_fanout_config(mut self, fanout: FanoutConfig) -> Self {
        self.fanout = fanout;
        self
    }

    pub async fn sign_in(&self, auth: AuthContext) {
        *self.auth.lock().await = Some(auth);
    }

    pub async fn sign_out(&self) {
        *self.auth.lock().await = None;
    }

    async fn require_auth(&self) -> Result<AuthContext, OpError> {
        self.auth.lock().await.clone().ok_or(OpError::Unauthorized)
    }

    // -----------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------

    pub async fn create_group(&self, name: &str, description: &str) -> Result<GroupDoc, OpError> {
        let auth = self.require_auth().await?;
        validate_group_name(name)?;

        let draft = GroupDraft {
            name: name.trim().to_owned(),
            description: description.trim().to_owned(),
            join_code: generate_join_code(),
            created_by: auth.uid.clone(),
            creator_name: auth.display_label().to_owned(),
        };
        Ok(self.storage.create_group(draft).await?)
    }

    pub async fn join_group(&self, join_code: &str) -> Result<GroupDoc, OpError> {
        let auth = self.require_auth().await?;
        let code = normalize_join_code(join_code)?;

        let group = self.storage.find_group_by_join_code(&code).await?;
        let member = GroupMember {
            uid: auth.uid.clone(),
            name: auth.display_label().to_owned(),
            role: MemberRole::Member,
        };
        Ok(self.storage.join_group(&group.id, member).await?)
    }

    pub async fn leave_group(&self, group_id: &str) -> Result<(), OpError> {
        let auth = self.require_auth().await?;
        Ok(self.storage.leave_group(group_id, &auth.uid).await?)
    }

    /// Live view of the groups the signed-in user belongs to.
    pub async fn my_groups(&self) -> Result<SnapshotStream<Vec<GroupDoc>>, OpError> {
        let auth = self.require_auth().await?;
        Ok(self.storage.watch_groups_for(&auth.uid).await?)
    }

    // -----------------------------------------------------------------
    // Assignments
    // -----------------------------------------------------------------

    /// Creates an assignment and announces it to the other group
    /// members. The roster snapshot on the document is resolved here,
    /// once; it does not track later membership changes.
    pub async fn create_assignment(
        &self,
        group_id: &str,
        input: NewAssignment,
    ) -> Result<AssignmentDoc, OpError> {
        let auth = self.require_auth().await?;
        validate_title(&input.title)?;

        let group = self.storage.get_group(group_id).await?;
        let mut member_ids = group.roster_uids();
        if member_ids.is_empty() {
            member_ids = vec![auth.uid.clone()];
        }

        let draft = AssignmentDraft {
            title: input.title.trim().to_owned(),
            description: input.description.trim().to_owned(),
            due_at: input.due_at,
            status: initial_status(input.due_at, OffsetDateTime::now_utc()),
            created_by: auth.uid.clone(),
            group_name: group.name.clone(),
            member_ids,
        };
        let assignment = self.storage.create_assignment(group_id, draft).await?;

        let message = format!(
            "{} (Due: {}) in {}",
            assignment.title,
            format_due_date(assignment.due_at),
            group.name
        );
        notify_group_members(
            self.storage.as_ref(),
            &self.fanout,
            FanoutRequest {
                group_id: group_id.to_owned(),
                actor_uid: auth.uid,
                title: "New assignment added".to_owned(),
                message,
                kind: NotificationKind::Assignment,
                target: NotificationTarget::AssignmentsTab,
            },
        )
        .await?;

        Ok(assignment)
    }

    pub async fn complete_assignment(
        &self,
        group_id: &str,
        assignment_id: &str,
    ) -> Result<AssignmentDoc, OpError> {
        self.require_auth().await?;
        Ok(self
            .storage
            .complete_assignment(group_id, assignment_id)
            .await?)
    }

    /// Spawns the merged real-time assignments view for the signed-in
    /// user.
    pub async fn assignments(&self) -> Result<EngineHandle, OpError> {
        let auth = self.require_auth().await?;
        let storage: Arc<dyn EngineStorage> = self.storage.clone();
        Ok(AssignmentEngine::new(storage).spawn(auth.uid))
    }

    // -----------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------

    pub async fn watch_tasks(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<TaskDoc>>, OpError> {
        self.require_auth().await?;
        Ok(self.storage.watch_tasks(group_id).await?)
    }

    pub async fn create_task(&self, group_id: &str, input: NewTask) -> Result<TaskDoc, OpError> {
        let auth = self.require_auth().await?;
        validate_title(&input.title)?;

        let draft = TaskDraft {
            title: input.title.trim().to_owned(),
            description: input.description.trim().to_owned(),
            created_by_uid: auth.uid.clone(),
            created_by_name: auth.display_label().to_owned(),
        };
        Ok(self.storage.create_task(group_id, draft).await?)
    }

    pub async fn advance_task(&self, group_id: &str, task_id: &str) -> Result<TaskDoc, OpError> {
        self.require_auth().await?;
        Ok(self.storage.advance_task(group_id, task_id).await?)
    }

    pub async fn delete_task(&self, group_id: &str, task_id: &str) -> Result<(), OpError> {
        self.require_auth().await?;
        Ok(self.storage.delete_task(group_id, task_id).await?)
    }

    // -----------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------

    pub async fn watch_files(
        &self,
        group_id: &str,
    ) -> Result<SnapshotStream<Vec<FileDoc>>, OpError> {
        self.require_auth().await?;
        Ok(self.storage.watch_files(group_id).await?)
    }

    /// Uploads through the capability bridge, records the file document,
    /// and announces it to the other group members.
    pub async fn upload_file(
        &self,
        group_id: &str,
        file_name: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<FileDoc, OpError> {
        let auth = self.require_auth().await?;
        validate_file_name(file_name)?;
        let bridge = self.bridge.as_ref().ok_or(OpError::BridgeDisabled)?;
        let group = self.storage.get_group(group_id).await?;

        let file_name = file_name.trim();
        let storage_path = format!(
            "{}/{}-{}",
            auth.uid,
            OffsetDateTime::now_utc().unix_timestamp(),
            file_name
        );
        let stored_path = bridge
            .exchange_and_upload(&auth.id_token, &storage_path, payload, content_type)
            .await?;

        let file = self
            .storage
            .add_file(
                group_id,
                FileDraft {
                    file_name: file_name.to_owned(),
                    storage_path: stored_path,
                    uploaded_by: auth.display_label().to_owned(),
                    uploaded_by_uid: auth.uid.clone(),
                    provider: "bridge".to_owned(),
                    content_type: content_type.to_owned(),
                    size: Some(payload.len() as i64),
                },
            )
            .await?;

        notify_group_members(
            self.storage.as_ref(),
            &self.fanout,
            FanoutRequest {
                group_id: group_id.to_owned(),
                actor_uid: auth.uid,
                title: "New file uploaded".to_owned(),
                message: file.file_name.clone(),
                kind: NotificationKind::File,
                target: NotificationTarget::GroupDetail {
                    group_id: group_id.to_owned(),
                    group_name: Some(group.name),
                    initial_tab: Some(GroupTab::Files),
                },
            },
        )
        .await?;

        Ok(file)
    }

    /// Exchanges the identity token for a time-limited read URL on one
    /// stored file.
    pub async fn open_file(&self, storage_path: &str) -> Result<String, OpError> {
        let auth = self.require_auth().await?;
        let bridge = self.bridge.as_ref().ok_or(OpError::BridgeDisabled)?;
        Ok(bridge
            .exchange_and_sign(&auth.id_token, storage_path, None)
            .await?)
    }

    // -----------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------

    pub async fn notifications(
        &self,
    ) -> Result<SnapshotStream<Vec<NotificationDoc>>, OpError> {
        let auth = self.require_auth().await?;
        Ok(self.storage.watch_notifications(&auth.uid).await?)
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), OpError> {
        let auth = self.require_auth().await?;
        Ok(self
            .storage
            .mark_read(&auth.uid, notification_id)
            .await?)
    }

    pub async fn clear_notifications(&self) -> Result<usize, OpError> {
        let auth = self.require_auth().await?;
        Ok(self.storage.clear_notifications(&auth.uid).await?)
    }
}

fn format_due_date(due_at: OffsetDateTime) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        due_at.day(),
        u8::from(due_at.month()),
        due_at.year()
    )
}
