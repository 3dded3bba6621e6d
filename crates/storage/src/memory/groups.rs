use async_trait::async_trait;
use edusync_core::types::{GroupDoc, GroupMember, MemberRole};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{register, MemoryStore};
use crate::{GroupDraft, GroupStore, SnapshotStream, StoreError};

#[async_trait]
impl GroupStore for MemoryStore {
    async fn watch_groups_for(
        &self,
        uid: &str,
    ) -> Result<SnapshotStream<Vec<GroupDoc>>, StoreError> {
        let mut state = self.state.write().await;
        let initial = state.groups_for(uid);
        Ok(register(&mut state.group_watchers, uid, initial))
    }

    async fn get_group(&self, group_id: &str) -> Result<GroupDoc, StoreError> {
        self.state
            .read()
            .await
            .groups
            .get(group_id)
            .cloned()
            .ok_or(StoreError::GroupNotFound)
    }

    async fn create_group(&self, draft: GroupDraft) -> Result<GroupDoc, StoreError> {
        let mut state = self.state.write().await;
        let doc = GroupDoc {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            join_code: draft.join_code,
            created_at: OffsetDateTime::now_utc(),
            created_by: draft.created_by.clone(),
            member_ids: vec![draft.created_by.clone()],
            members: vec![GroupMember {
                uid: draft.created_by,
                name: draft.creator_name,
                role: MemberRole::Admin,
            }],
        };
        state.groups.insert(doc.id.clone(), doc.clone());
        state.emit_groups();
        Ok(doc)
    }

    async fn find_group_by_join_code(&self, join_code: &str) -> Result<GroupDoc, StoreError> {
        self.state
            .read()
            .await
            .groups
            .values()
            .find(|group| group.join_code == join_code)
            .cloned()
            .ok_or(StoreError::GroupNotFound)
    }

    async fn join_group(
        &self,
        group_id: &str,
        member: GroupMember,
    ) -> Result<GroupDoc, StoreError> {
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(group_id)
            .ok_or(StoreError::GroupNotFound)?;
        if group.is_member(&member.uid) {
            return Err(StoreError::AlreadyMember);
        }
        group.member_ids.push(member.uid.clone());
        group.members.push(member);
        let doc = group.clone();
        state.emit_groups();
        Ok(doc)
    }

    async fn leave_group(&self, group_id: &str, uid: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(group_id)
            .ok_or(StoreError::GroupNotFound)?;
        let in_roster = group.member_ids.iter().any(|id| id == uid)
            || group.members.iter().any(|member| member.uid == uid);
        if !in_roster {
            return Err(StoreError::NotAMember);
        }
        group.member_ids.retain(|id| id != uid);
        group.members.retain(|member| member.uid != uid);
        state.emit_groups();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use edusync_core::types::{GroupMember, MemberRole};

    use super::MemoryStore;
    use crate::{GroupDraft, GroupStore, StoreError};

    fn member(uid: &str) -> GroupMember {
        GroupMember {
            uid: uid.to_owned(),
            name: uid.to_owned(),
            role: MemberRole::Member,
        }
    }

    async fn create(store: &MemoryStore, name: &str, creator: &str) -> String {
        store
            .create_group(GroupDraft {
                name: name.to_owned(),
                description: "desc".to_owned(),
                join_code: "A1B2C3".to_owned(),
                created_by: creator.to_owned(),
                creator_name: creator.to_owned(),
            })
            .await
            .expect("create group")
            .id
    }

    #[tokio::test]
    async fn create_seeds_both_rosters_with_the_creator() {
        let store = MemoryStore::new();
        let group_id = create(&store, "Algorithms", "u1").await;

        let group = store.get_group(&group_id).await.expect("get group");
        assert_eq!(group.member_ids, vec!["u1"]);
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn join_rejects_existing_members() {
        let store = MemoryStore::new();
        let group_id = create(&store, "Algorithms", "u1").await;

        store
            .join_group(&group_id, member("u2"))
            .await
            .expect("join group");
        let error = store
            .join_group(&group_id, member("u2"))
            .await
            .expect_err("double join should fail");
        assert_eq!(error, StoreError::AlreadyMember);

        let creator_error = store
            .join_group(&group_id, member("u1"))
            .await
            .expect_err("creator is already a member");
        assert_eq!(creator_error, StoreError::AlreadyMember);
    }

    #[tokio::test]
    async fn leave_removes_from_both_rosters() {
        let store = MemoryStore::new();
        let group_id = create(&store, "Algorithms", "u1").await;
        store
            .join_group(&group_id, member("u2"))
            .await
            .expect("join group");

        store
            .leave_group(&group_id, "u2")
            .await
            .expect("leave group");
        let group = store.get_group(&group_id).await.expect("get group");
        assert_eq!(group.member_ids, vec!["u1"]);
        assert!(group.members.iter().all(|m| m.uid != "u2"));

        let error = store
            .leave_group(&group_id, "u2")
            .await
            .expect_err("leaving twice should fail");
        assert_eq!(error, StoreError::NotAMember);
    }

    #[tokio::test]
    async fn leave_unknown_group_is_not_found() {
        let store = MemoryStore::new();
        let error = store
            .leave_group("missing", "u1")
            .await
            .expect_err("missing group");
        assert_eq!(error, StoreError::GroupNotFound);
    }

    #[tokio::test]
    async fn find_by_join_code_matches_exactly() {
        let store = MemoryStore::new();
        let group_id = create(&store, "Algorithms", "u1").await;

        let found = store
            .find_group_by_join_code("A1B2C3")
            .await
            .expect("find group");
        assert_eq!(found.id, group_id);

        let error = store
            .find_group_by_join_code("ZZZZZZ")
            .await
            .expect_err("unknown code");
        assert_eq!(error, StoreError::GroupNotFound);
    }

    #[tokio::test]
    async fn membership_watch_tracks_joins_and_leaves() {
        let store = MemoryStore::new();
        let mut stream = store
            .watch_groups_for("u2")
            .await
            .expect("watch groups");
        assert!(stream.next().await.expect("initial").expect("ok").is_empty());

        let group_id = create(&store, "Algorithms", "u1").await;
        // u2 is not a member yet: snapshot emitted on mutation is still empty.
        assert!(stream.next().await.expect("created").expect("ok").is_empty());

        store
            .join_group(&group_id, member("u2"))
            .await
            .expect("join group");
        let snapshot = stream.next().await.expect("joined").expect("ok");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, group_id);

        store
            .leave_group(&group_id, "u2")
            .await
            .expect("leave group");
        assert!(stream.next().await.expect("left").expect("ok").is_empty());
    }

    #[tokio::test]
    async fn membership_snapshots_sort_by_name() {
        let store = MemoryStore::new();
        create(&store, "Operating Systems", "u1").await;
        create(&store, "Algorithms", "u1").await;

        let mut stream = store.watch_groups_for("u1").await.expect("watch groups");
        let snapshot = stream.next().await.expect("initial").expect("ok");
        let names: Vec<&str> = snapshot.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Algorithms", "Operating Systems"]);
    }
}
