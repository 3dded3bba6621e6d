use std::collections::BTreeMap;

use edusync_core::types::{AssignmentDoc, FileDoc, GroupDoc, NotificationDoc, TaskDoc};
use tokio::sync::{mpsc, RwLock};

use crate::{SnapshotStream, StoreError};

mod assignments;
mod files;
mod groups;
mod notifications;
mod tasks;

/// In-process document store with live snapshot watches. Stands where a
/// cloud document database would in production; tests and local runs use
/// it directly. Every watch emission is a full replace-semantics
/// snapshot, sequenced per topic under the state lock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

type Watchers<T> = Vec<(String, mpsc::Sender<Result<T, StoreError>>)>;

#[derive(Default)]
struct MemoryState {
    groups: BTreeMap<String, GroupDoc>,
    assignments: BTreeMap<String, BTreeMap<String, AssignmentDoc>>,
    tasks: BTreeMap<String, BTreeMap<String, TaskDoc>>,
    files: BTreeMap<String, BTreeMap<String, FileDoc>>,
    notifications: BTreeMap<String, BTreeMap<String, NotificationDoc>>,
    group_watchers: Watchers<Vec<GroupDoc>>,
    assignment_watchers: Watchers<Vec<AssignmentDoc>>,
    task_watchers: Watchers<Vec<TaskDoc>>,
    file_watchers: Watchers<Vec<FileDoc>>,
    notification_watchers: Watchers<Vec<NotificationDoc>>,
}

impl MemoryState {
    /// Server-side membership query: groups whose `memberIds` contains
    /// the uid, ordered by name.
    fn groups_for(&self, uid: &str) -> Vec<GroupDoc> {
        let mut groups: Vec<GroupDoc> = self
            .groups
            .values()
            .filter(|group| group.member_ids.iter().any(|id| id == uid))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        groups
    }

    fn assignments_for(&self, group_id: &str) -> Vec<AssignmentDoc> {
        let mut records: Vec<AssignmentDoc> = self
            .assignments
            .get(group_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    fn tasks_for(&self, group_id: &str) -> Vec<TaskDoc> {
        let mut tasks: Vec<TaskDoc> = self
            .tasks
            .get(group_id)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    fn files_for(&self, group_id: &str) -> Vec<FileDoc> {
        let mut files: Vec<FileDoc> = self
            .files
            .get(group_id)
            .map(|files| files.values().cloned().collect())
            .unwrap_or_default();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        files
    }

    fn notifications_for(&self, uid: &str) -> Vec<NotificationDoc> {
        let mut notifications: Vec<NotificationDoc> = self
            .notifications
            .get(uid)
            .map(|notifications| notifications.values().cloned().collect())
            .unwrap_or_default();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        notifications
    }

    /// Group snapshots depend on the watcher's uid, so every group
    /// watcher gets a freshly computed view.
    fn emit_groups(&mut self) {
        let uids: Vec<String> = self
            .group_watchers
            .iter()
            .map(|(uid, _)| uid.clone())
            .collect();
        let snapshots: BTreeMap<String, Vec<GroupDoc>> = uids
            .into_iter()
            .map(|uid| {
                let snapshot = self.groups_for(&uid);
                (uid, snapshot)
            })
            .collect();
        self.group_watchers.retain(|(uid, sender)| {
            let Some(snapshot) = snapshots.get(uid) else {
                return true;
            };
            sender.try_send(Ok(snapshot.clone())).is_ok()
        });
    }

    fn emit_assignments(&mut self, group_id: &str) {
        let snapshot = self.assignments_for(group_id);
        emit_to(&mut self.assignment_watchers, group_id, &snapshot);
    }

    fn emit_tasks(&mut self, group_id: &str) {
        let snapshot = self.tasks_for(group_id);
        emit_to(&mut self.task_watchers, group_id, &snapshot);
    }

    fn emit_files(&mut self, group_id: &str) {
        let snapshot = self.files_for(group_id);
        emit_to(&mut self.file_watchers, group_id, &snapshot);
    }

    fn emit_notifications(&mut self, uid: &str) {
        let snapshot = self.notifications_for(uid);
        emit_to(&mut self.notification_watchers, uid, &snapshot);
    }
}

fn register<T: Clone>(watchers: &mut Watchers<T>, key: &str, initial: T) -> SnapshotStream<T> {
    let (tx, stream) = SnapshotStream::channel();
    let _ = tx.try_send(Ok(initial));
    watchers.push((key.to_owned(), tx));
    stream
}

/// Delivers to every watcher registered under `key`, evicting watchers
/// whose channel is closed or full.
fn emit_to<T: Clone>(watchers: &mut Watchers<T>, key: &str, snapshot: &T) {
    watchers.retain(|(watch_key, sender)| {
        if watch_key != key {
            return true;
        }
        sender.try_send(Ok(snapshot.clone())).is_ok()
    });
}
