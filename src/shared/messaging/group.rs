//! Group Data Structure
//!
//! Represents a group: a named member set, a non-empty admin set, and a flag
//! controlling whether non-admin members may post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    /// Never empty while the group is not deleted
    pub admin_ids: Vec<Uuid>,
    pub member_ids: Vec<Uuid>,
    pub can_send_messages: bool,
    pub is_deleted: bool,
    pub latest_message_id: Option<Uuid>,
    pub latest_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Create a group with `creator` as sole admin.
    ///
    /// The creator is added to `member_ids`; duplicates are dropped.
    pub fn new(name: String, creator: Uuid, member_ids: &[Uuid]) -> Self {
        let mut members = vec![creator];
        for id in member_ids {
            if !members.contains(id) {
                members.push(*id);
            }
        }
        Self {
            id: Uuid::new_v4(),
            name,
            admin_ids: vec![creator],
            member_ids: members,
            can_send_messages: true,
            is_deleted: false,
            latest_message_id: None,
            latest_message_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Admins count as members for authorization purposes
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id) || self.is_admin(user_id)
    }

    pub fn can_post(&self, user_id: Uuid) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_admin(user_id) || (self.is_member(user_id) && self.can_send_messages)
    }

    pub fn is_authorized_viewer(&self, user_id: Uuid) -> bool {
        !self.is_deleted && self.is_member(user_id)
    }

    /// Admins and members, deduplicated, in membership order
    pub fn participants(&self) -> Vec<Uuid> {
        let mut all = self.member_ids.clone();
        for admin in &self.admin_ids {
            if !all.contains(admin) {
                all.push(*admin);
            }
        }
        all
    }

    /// Move the latest-message pointer, keeping the newest timestamp
    pub fn advance_latest(&mut self, message_id: Uuid, at: DateTime<Utc>) -> bool {
        match self.latest_message_at {
            Some(current) if current > at => false,
            _ => {
                self.latest_message_id = Some(message_id);
                self.latest_message_at = Some(at);
                true
            }
        }
    }
}

/// Request to create a group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub member_ids: Vec<Uuid>,
}

/// Request to add members to a group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub member_ids: Vec<Uuid>,
}

/// Request to toggle member posting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettingsRequest {
    pub can_send_messages: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListGroupsResponse {
    pub groups: Vec<Group>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_is_admin_and_member() {
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();
        let group = Group::new("team".into(), creator, &[member, member, creator]);
        assert_eq!(group.admin_ids, vec![creator]);
        assert_eq!(group.member_ids, vec![creator, member]);
    }

    #[test]
    fn test_can_post_respects_flag_for_members_only() {
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let mut group = Group::new("team".into(), creator, &[member]);

        assert!(group.can_post(member));
        group.can_send_messages = false;
        assert!(!group.can_post(member));
        assert!(group.can_post(creator));
        assert!(!group.can_post(outsider));
    }

    #[test]
    fn test_deleted_group_has_no_viewers() {
        let creator = Uuid::new_v4();
        let mut group = Group::new("team".into(), creator, &[]);
        assert!(group.is_authorized_viewer(creator));
        group.is_deleted = true;
        assert!(!group.is_authorized_viewer(creator));
        assert!(!group.can_post(creator));
    }
}
