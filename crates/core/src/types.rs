use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Group document. `member_ids` is the server-queryable roster;
/// `members` is the richer roster kept alongside it and used as a
/// fallback when `member_ids` is absent or empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDoc {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "description", default)]
    pub description: String,
    #[serde(rename = "joinCode")]
    pub join_code: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(rename = "memberIds", default)]
    pub member_ids: Vec<String>,
    #[serde(rename = "members", default)]
    pub members: Vec<GroupMember>,
}

impl GroupDoc {
    /// Resolves the member uid list: `member_ids` when non-empty,
    /// otherwise the uids of `members`. Empty uids are dropped and
    /// duplicates keep their first position.
    #[must_use]
    pub fn roster_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self
            .member_ids
            .iter()
            .filter(|uid| !uid.is_empty())
            .cloned()
            .collect();
        if uids.is_empty() {
            uids = self
                .members
                .iter()
                .map(|member| member.uid.clone())
                .filter(|uid| !uid.is_empty())
                .collect();
        }

        let mut seen = std::collections::HashSet::new();
        uids.retain(|uid| seen.insert(uid.clone()));
        uids
    }

    pub fn is_member(&self, uid: &str) -> bool {
        self.member_ids.iter().any(|id| id == uid)
            || self.created_by == uid
            || self.members.iter().any(|member| member.uid == uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(rename = "uid")]
    pub uid: String,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "role")]
    pub role: MemberRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

/// Persisted assignment status. The classification bucket is derived
/// from this plus the due date and is never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Upcoming,
    Due,
    Completed,
}

/// Assignment document inside a group's `assignments` sub-collection.
/// `group_id`, `group_name`, and `member_ids` are denormalized at
/// creation time; `member_ids` is a point-in-time roster snapshot and
/// may drift from the live group roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentDoc {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "description", default)]
    pub description: String,
    #[serde(rename = "dueDate", with = "time::serde::rfc3339")]
    pub due_at: OffsetDateTime,
    #[serde(rename = "status")]
    pub status: AssignmentStatus,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(
        rename = "completedAt",
        with = "time::serde::rfc3339::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(rename = "groupId", default)]
    pub group_id: String,
    #[serde(rename = "groupName", default)]
    pub group_name: String,
    #[serde(rename = "memberIds", default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Status cycle used by the tap-to-advance flow.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Todo => Self::InProgress,
            Self::InProgress => Self::Done,
            Self::Done => Self::Todo,
        }
    }
}

/// Shared task inside a group's `tasks` sub-collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDoc {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "description", default)]
    pub description: String,
    #[serde(rename = "status")]
    pub status: TaskStatus,
    #[serde(rename = "createdByUid")]
    pub created_by_uid: String,
    #[serde(rename = "createdByName", default)]
    pub created_by_name: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// File record inside a group's `files` sub-collection. The bytes live
/// in object storage behind the capability bridge; `storage_path` is the
/// key handed back by an upload exchange. `url` stays empty; reads go
/// through time-limited signed URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDoc {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "storagePath")]
    pub storage_path: String,
    #[serde(rename = "url", default)]
    pub url: String,
    #[serde(rename = "uploadedBy", default)]
    pub uploaded_by: String,
    #[serde(rename = "uploadedByUid")]
    pub uploaded_by_uid: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "provider", default)]
    pub provider: String,
    #[serde(rename = "contentType", default)]
    pub content_type: String,
    #[serde(rename = "size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    File,
    Task,
    Assignment,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupTab {
    Files,
    Tasks,
    Assignments,
}

/// Navigation payload attached to a notification, shaped as
/// `{"screen": ..., "params": {...}}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "screen", content = "params")]
pub enum NotificationTarget {
    GroupDetail {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "groupName", default, skip_serializing_if = "Option::is_none")]
        group_name: Option<String>,
        #[serde(rename = "initialTab", default, skip_serializing_if = "Option::is_none")]
        initial_tab: Option<GroupTab>,
    },
    Tasks,
    Assignments,
    AssignmentsTab,
}

/// Notification document inside the recipient's personal
/// `notifications` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDoc {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "message")]
    pub message: String,
    #[serde(rename = "groupId", default)]
    pub group_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(rename = "target")]
    pub target: NotificationTarget,
    #[serde(rename = "read")]
    pub read: bool,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Notification payload before the store assigns an id and a
/// server-side `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    #[serde(rename = "title")]
    pub title: String,
    #[serde(rename = "message")]
    pub message: String,
    #[serde(rename = "groupId", default)]
    pub group_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(rename = "target")]
    pub target: NotificationTarget,
    #[serde(rename = "read")]
    pub read: bool,
}
