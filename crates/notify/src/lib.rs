#![forbid(unsafe_code)]

use std::time::Duration;

use async_trait::async_trait;
use edusync_core::types::{GroupDoc, NotificationDraft, NotificationKind, NotificationTarget};
use edusync_storage::{GroupStore, NotificationStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Upper bound on the batch commit. Delivery is all-or-nothing per
    /// call but NOT idempotent: retrying after an ambiguous timeout can
    /// double-notify recipients.
    pub commit_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            commit_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FanoutError {
    #[error("group not found")]
    GroupNotFound,
    #[error("fanout commit timed out")]
    Timeout,
    #[error(transparent)]
    Store(StoreError),
}

/// One triggering event to announce to a group.
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutRequest {
    pub group_id: String,
    pub actor_uid: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub target: NotificationTarget,
}

/// The slice of storage fanout needs: the live group lookup and the
/// atomic notification batch. Any full document store satisfies it
/// through the blanket impl.
#[async_trait]
pub trait FanoutStorage: Send + Sync {
    async fn get_group(&self, group_id: &str) -> Result<GroupDoc, StoreError>;
    async fn push_notifications(
        &self,
        batch: &[(String, NotificationDraft)],
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T> FanoutStorage for T
where
    T: GroupStore + NotificationStore + Send + Sync,
{
    async fn get_group(&self, group_id: &str) -> Result<GroupDoc, StoreError> {
        GroupStore::get_group(self, group_id).await
    }

    async fn push_notifications(
        &self,
        batch: &[(String, NotificationDraft)],
    ) -> Result<(), StoreError> {
        NotificationStore::push_notifications(self, batch).await
    }
}

/// Writes one notification per group member other than the actor, as a
/// single atomic batch: either every recipient has a notification
/// afterwards or none do. Membership is resolved live at call time
/// (never from a cached roster), preferring `memberIds` with the richer
/// `members` roster as fallback. Returns how many notifications were
/// written; an empty recipient set is a successful no-op.
pub async fn notify_group_members(
    storage: &dyn FanoutStorage,
    config: &FanoutConfig,
    request: FanoutRequest,
) -> Result<usize, FanoutError> {
    let group = match storage.get_group(&request.group_id).await {
        Ok(group) => group,
        Err(StoreError::GroupNotFound) => return Err(FanoutError::GroupNotFound),
        Err(error) => return Err(FanoutError::Store(error)),
    };

    let recipients: Vec<String> = group
        .roster_uids()
        .into_iter()
        .filter(|uid| uid != &request.actor_uid)
        .collect();
    if recipients.is_empty() {
        return Ok(0);
    }

    let batch: Vec<(String, NotificationDraft)> = recipients
        .into_iter()
        .map(|uid| {
            (
                uid,
                NotificationDraft {
                    title: request.title.clone(),
                    message: request.message.clone(),
                    group_id: request.group_id.clone(),
                    kind: request.kind,
                    target: request.target.clone(),
                    read: false,
                },
            )
        })
        .collect();

    let written = batch.len();
    match tokio::time::timeout(config.commit_timeout, storage.push_notifications(&batch)).await {
        Ok(Ok(())) => Ok(written),
        Ok(Err(error)) => {
            tracing::error!(group_id = %request.group_id, %error, "notification fanout failed");
            Err(FanoutError::Store(error))
        }
        Err(_) => {
            tracing::error!(group_id = %request.group_id, "notification fanout timed out");
            Err(FanoutError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use edusync_core::types::{
        GroupDoc, GroupMember, MemberRole, NotificationDoc, NotificationDraft, NotificationKind,
        NotificationTarget,
    };
    use edusync_storage::{
        GroupDraft, GroupStore, MemoryStore, NotificationStore, SnapshotStream, StoreError,
    };
    use time::macros::datetime;
    use tokio::sync::Mutex;

    use super::{notify_group_members, FanoutConfig, FanoutError, FanoutRequest};

    fn request(actor: &str) -> FanoutRequest {
        FanoutRequest {
            group_id: "g1".to_owned(),
            actor_uid: actor.to_owned(),
            title: "New file uploaded".to_owned(),
            message: "notes.pdf".to_owned(),
            kind: NotificationKind::File,
            target: NotificationTarget::GroupDetail {
                group_id: "g1".to_owned(),
                group_name: Some("Algorithms".to_owned()),
                initial_tab: None,
            },
        }
    }

    fn group(member_ids: Vec<&str>, members: Vec<&str>) -> GroupDoc {
        GroupDoc {
            id: "g1".to_owned(),
            name: "Algorithms".to_owned(),
            description: String::new(),
            join_code: "A1B2C3".to_owned(),
            created_at: datetime!(2024-01-01 00:00 UTC),
            created_by: "A".to_owned(),
            member_ids: member_ids.into_iter().map(ToOwned::to_owned).collect(),
            members: members
                .into_iter()
                .map(|uid| GroupMember {
                    uid: uid.to_owned(),
                    name: uid.to_owned(),
                    role: MemberRole::Member,
                })
                .collect(),
        }
    }

    /// Records every batch handed to the store, optionally failing or
    /// hanging the commit.
    struct RecordingStorage {
        group: Option<GroupDoc>,
        batches: Mutex<Vec<Vec<(String, NotificationDraft)>>>,
        fail_commit: bool,
        hang_commit: bool,
    }

    impl RecordingStorage {
        fn with_group(group: GroupDoc) -> Self {
            Self {
                group: Some(group),
                batches: Mutex::new(Vec::new()),
                fail_commit: false,
                hang_commit: false,
            }
        }
    }

    // Fanout reaches the recorder through the blanket `FanoutStorage`
    // impl, the same path a full document store takes.
    #[async_trait]
    impl GroupStore for RecordingStorage {
        async fn watch_groups_for(
            &self,
            _uid: &str,
        ) -> Result<SnapshotStream<Vec<GroupDoc>>, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn get_group(&self, _group_id: &str) -> Result<GroupDoc, StoreError> {
            self.group.clone().ok_or(StoreError::GroupNotFound)
        }

        async fn create_group(&self, _draft: GroupDraft) -> Result<GroupDoc, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn find_group_by_join_code(&self, _join_code: &str) -> Result<GroupDoc, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn join_group(
            &self,
            _group_id: &str,
            _member: GroupMember,
        ) -> Result<GroupDoc, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn leave_group(&self, _group_id: &str, _uid: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }
    }

    #[async_trait]
    impl NotificationStore for RecordingStorage {
        async fn watch_notifications(
            &self,
            _uid: &str,
        ) -> Result<SnapshotStream<Vec<NotificationDoc>>, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn push_notifications(
            &self,
            batch: &[(String, NotificationDraft)],
        ) -> Result<(), StoreError> {
            if self.hang_commit {
                std::future::pending::<()>().await;
            }
            if self.fail_commit {
                return Err(StoreError::Unavailable);
            }
            self.batches.lock().await.push(batch.to_vec());
            Ok(())
        }

        async fn mark_read(&self, _uid: &str, _notification_id: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn clear_notifications(&self, _uid: &str) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable)
        }
    }

    #[tokio::test]
    async fn every_member_except_the_actor_is_notified() {
        let storage = RecordingStorage::with_group(group(vec!["A", "B", "C"], vec![]));
        let written = notify_group_members(&storage, &FanoutConfig::default(), request("A"))
            .await
            .expect("fanout");
        assert_eq!(written, 2);

        let batches = storage.batches.lock().await;
        assert_eq!(batches.len(), 1);
        let recipients: Vec<&str> = batches[0].iter().map(|(uid, _)| uid.as_str()).collect();
        assert_eq!(recipients, vec!["B", "C"]);
        assert!(batches[0].iter().all(|(_, draft)| !draft.read));
    }

    #[tokio::test]
    async fn a_group_of_one_is_a_successful_no_op() {
        let storage = RecordingStorage::with_group(group(vec!["A"], vec![]));
        let written = notify_group_members(&storage, &FanoutConfig::default(), request("A"))
            .await
            .expect("fanout");
        assert_eq!(written, 0);
        assert!(storage.batches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_group_aborts_with_group_not_found() {
        let storage = RecordingStorage {
            group: None,
            batches: Mutex::new(Vec::new()),
            fail_commit: false,
            hang_commit: false,
        };
        let error = notify_group_members(&storage, &FanoutConfig::default(), request("A"))
            .await
            .expect_err("missing group");
        assert_eq!(error, FanoutError::GroupNotFound);
        assert!(storage.batches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn member_list_falls_back_to_the_rich_roster() {
        let storage = RecordingStorage::with_group(group(vec![], vec!["A", "B"]));
        let written = notify_group_members(&storage, &FanoutConfig::default(), request("A"))
            .await
            .expect("fanout");
        assert_eq!(written, 1);

        let batches = storage.batches.lock().await;
        assert_eq!(batches[0][0].0, "B");
    }

    #[tokio::test]
    async fn a_failed_commit_leaves_zero_notifications() {
        let storage = RecordingStorage {
            group: Some(group(vec!["A", "B", "C"], vec![])),
            batches: Mutex::new(Vec::new()),
            fail_commit: true,
            hang_commit: false,
        };
        let error = notify_group_members(&storage, &FanoutConfig::default(), request("A"))
            .await
            .expect_err("commit failure");
        assert_eq!(error, FanoutError::Store(StoreError::Unavailable));
        assert!(storage.batches.lock().await.is_empty());
    }

    #[tokio::test]
    async fn a_hung_commit_surfaces_timeout() {
        let storage = RecordingStorage {
            group: Some(group(vec!["A", "B"], vec![])),
            batches: Mutex::new(Vec::new()),
            fail_commit: false,
            hang_commit: true,
        };
        let config = FanoutConfig {
            commit_timeout: Duration::from_millis(20),
        };
        let error = notify_group_members(&storage, &config, request("A"))
            .await
            .expect_err("hung commit");
        assert_eq!(error, FanoutError::Timeout);
    }

    #[tokio::test]
    async fn fanout_lands_in_each_recipients_collection() {
        let storage = Arc::new(MemoryStore::new());
        let created = edusync_storage::GroupStore::create_group(
            storage.as_ref(),
            edusync_storage::GroupDraft {
                name: "Algorithms".to_owned(),
                description: String::new(),
                join_code: "A1B2C3".to_owned(),
                created_by: "A".to_owned(),
                creator_name: "A".to_owned(),
            },
        )
        .await
        .expect("create group");
        edusync_storage::GroupStore::join_group(
            storage.as_ref(),
            &created.id,
            GroupMember {
                uid: "B".to_owned(),
                name: "B".to_owned(),
                role: MemberRole::Member,
            },
        )
        .await
        .expect("join group");

        let mut request = request("A");
        request.group_id = created.id.clone();
        let written = notify_group_members(storage.as_ref(), &FanoutConfig::default(), request)
            .await
            .expect("fanout");
        assert_eq!(written, 1);

        let mut stream = storage
            .watch_notifications("B")
            .await
            .expect("watch notifications");
        let snapshot = stream.next().await.expect("initial").expect("ok");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "New file uploaded");

        let mut actor_stream = storage
            .watch_notifications("A")
            .await
            .expect("watch actor notifications");
        assert!(actor_stream
            .next()
            .await
            .expect("initial")
            .expect("ok")
            .is_empty());
    }
}
