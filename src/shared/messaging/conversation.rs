//! Conversation Data Structure
//!
//! Represents a direct (1:1) conversation between exactly two users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::MessageView;

/// Order a pair of user ids so that `(a, b)` and `(b, a)` share one key
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Represents a direct conversation between two users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID
    pub id: Uuid,
    /// Both participants, ordered (see [`pair_key`])
    pub participants: [Uuid; 2],
    /// Latest message pointer
    pub latest_message_id: Option<Uuid>,
    /// Timestamp of the message behind `latest_message_id`
    pub latest_message_at: Option<DateTime<Utc>>,
    /// Users who have hidden this conversation
    pub deleted_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation between two users
    pub fn new_direct(user_a: Uuid, user_b: Uuid) -> Self {
        let (low, high) = pair_key(user_a, user_b);
        Self {
            id: Uuid::new_v4(),
            participants: [low, high],
            latest_message_id: None,
            latest_message_at: None,
            deleted_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Check if user is a participant
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// Get the other participant
    pub fn other_participant(&self, current_user_id: Uuid) -> Option<Uuid> {
        if !self.has_participant(current_user_id) {
            return None;
        }
        self.participants
            .iter()
            .find(|&&id| id != current_user_id)
            .copied()
    }

    /// Whether the conversation shows up in `user_id`'s list
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.has_participant(user_id) && !self.deleted_by.contains(&user_id)
    }

    /// Move the latest-message pointer, keeping the newest timestamp.
    ///
    /// Returns `false` when an equal-or-newer message is already recorded.
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

/// A conversation as listed for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user_id: Uuid,
    /// Latest message, if it is visible to the listing user
    pub latest_message: Option<MessageView>,
}

/// Response for listing conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// Request to create or open a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationRequest {
    pub other_user_id: Uuid,
}
