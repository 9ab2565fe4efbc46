//! Chat Message Data Structure
//!
//! Represents a message in either a direct conversation or a group, together
//! with its per-recipient delivery status and per-user visibility markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-recipient delivery status.
///
/// Variants are declared in progression order, so `Ord` follows the only
/// legal direction of travel: `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
        }
    }

    /// Parse from string (database)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            _ => None,
        }
    }

    /// The status after requesting a move to `target`.
    ///
    /// Returns `None` when `target` is not ahead of `self`; status never
    /// regresses.
    pub fn advance(self, target: DeliveryStatus) -> Option<DeliveryStatus> {
        (target > self).then_some(target)
    }

    /// Position in the progression, as stored for comparisons in SQL
    pub fn rank(self) -> i16 {
        match self {
            DeliveryStatus::Sent => 0,
            DeliveryStatus::Delivered => 1,
            DeliveryStatus::Read => 2,
        }
    }
}

/// One recipient's status for one message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub user_id: Uuid,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusEntry {
    pub fn sent(user_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            status: DeliveryStatus::Sent,
            timestamp: at,
        }
    }
}

/// Type of message content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text message
    #[default]
    Text,
    Image,
    Video,
    Audio,
    /// Generic file attachment
    File,
}

impl MessageType {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::File => "file",
        }
    }

    /// Parse from string (database or query string)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            "video" => Some(MessageType::Video),
            "audio" => Some(MessageType::Audio),
            "file" => Some(MessageType::File),
            _ => None,
        }
    }

    /// Whether this type is meaningless without a media URL
    pub fn requires_media(&self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

/// The container a message belongs to.
///
/// Conversations and groups are disjoint; `Message::is_group` decides which
/// one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Container {
    Direct(Uuid),
    Group(Uuid),
}

impl Container {
    pub fn id(&self) -> Uuid {
        match self {
            Container::Direct(id) | Container::Group(id) => *id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Container::Group(_))
    }
}

/// Represents a chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,
    /// User who sent the message
    pub sender: Uuid,
    /// Receiver of a direct message (`None` for group messages)
    pub receiver: Option<Uuid>,
    /// Direct conversation this message belongs to (`None` for group messages)
    pub conversation_id: Option<Uuid>,
    /// Group this message belongs to (`None` for direct messages)
    pub group_id: Option<Uuid>,
    pub is_group: bool,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub reply_to_message_id: Option<Uuid>,
    /// Per-recipient status, in recipient order
    pub status: Vec<StatusEntry>,
    /// Users who deleted this message for themselves
    pub deleted_by: Vec<Uuid>,
    /// Global tombstone set by delete-for-everyone; content is retained
    pub is_deleted: bool,
    /// Marker only: no cryptographic transform is applied
    pub encrypted: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Which container this message belongs to.
    ///
    /// Returns `None` only for a malformed record with neither id set.
    pub fn container(&self) -> Option<Container> {
        if self.is_group {
            self.group_id.map(Container::Group)
        } else {
            self.conversation_id.map(Container::Direct)
        }
    }

    /// Whether `viewer` should see this message when listing
    pub fn is_visible_to(&self, viewer: Uuid) -> bool {
        !self.is_deleted && !self.deleted_by.contains(&viewer)
    }

    /// The status entry for a given recipient
    pub fn status_for(&self, user_id: Uuid) -> Option<&StatusEntry> {
        self.status.iter().find(|entry| entry.user_id == user_id)
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        if self.content.chars().count() <= max_len {
            self.content.clone()
        } else {
            let mut preview: String = self.content.chars().take(max_len.saturating_sub(3)).collect();
            preview.push_str("...");
            preview
        }
    }
}

/// A message as seen by one viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    /// Whether the viewer sent this message
    pub is_your: bool,
    /// Group-aware summary of `message.status`
    pub overall_status: DeliveryStatus,
}

/// Request to send a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Receiver user id for direct messages, group id for group messages
    pub target: Uuid,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub reply_to: Option<Uuid>,
}

/// Query parameters for fetching a page of messages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(page_size)) as u32
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_more: page < total_pages,
        }
    }
}

/// Response for fetching a page of messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<MessageView>,
    pub pagination: Pagination,
}

/// Query parameters for deleting a message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteMessageQuery {
    #[serde(default)]
    pub for_everyone: bool,
}

/// Query parameters for searching messages in a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub container_id: Uuid,
    #[serde(default)]
    pub is_group: bool,
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(content: &str) -> Message {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        Message {
            id: Uuid::new_v4(),
            sender,
            receiver: Some(receiver),
            conversation_id: Some(Uuid::new_v4()),
            group_id: None,
            is_group: false,
            content: content.to_string(),
            message_type: MessageType::Text,
            media_url: None,
            reply_to_message_id: None,
            status: vec![StatusEntry::sent(receiver, Utc::now())],
            deleted_by: Vec::new(),
            is_deleted: false,
            encrypted: true,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_status_order_is_progression() {
        assert!(DeliveryStatus::Sent < DeliveryStatus::Delivered);
        assert!(DeliveryStatus::Delivered < DeliveryStatus::Read);
    }

    #[test]
    fn test_advance_never_regresses() {
        assert_eq!(DeliveryStatus::Sent.advance(DeliveryStatus::Delivered), Some(DeliveryStatus::Delivered));
        assert_eq!(DeliveryStatus::Sent.advance(DeliveryStatus::Read), Some(DeliveryStatus::Read));
        assert_eq!(DeliveryStatus::Delivered.advance(DeliveryStatus::Read), Some(DeliveryStatus::Read));
        assert_eq!(DeliveryStatus::Read.advance(DeliveryStatus::Sent), None);
        assert_eq!(DeliveryStatus::Read.advance(DeliveryStatus::Read), None);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&DeliveryStatus::Read).unwrap();
        assert_eq!(json, "\"read\"");
        assert_eq!(DeliveryStatus::parse("delivered"), Some(DeliveryStatus::Delivered));
        assert_eq!(DeliveryStatus::parse("seen"), None);
    }

    #[test]
    fn test_visibility() {
        let mut message = sample("hi");
        let viewer = message.sender;
        assert!(message.is_visible_to(viewer));

        message.deleted_by.push(viewer);
        assert!(!message.is_visible_to(viewer));
        assert!(message.is_visible_to(message.receiver.unwrap()));

        message.is_deleted = true;
        assert!(!message.is_visible_to(message.receiver.unwrap()));
    }

    #[test]
    fn test_container() {
        let message = sample("hi");
        assert_eq!(message.container(), Some(Container::Direct(message.conversation_id.unwrap())));
    }

    #[test]
    fn test_preview_counts_chars() {
        let message = sample("héllo wörld, long enough");
        assert_eq!(message.preview(8), "héllo...");
        assert_eq!(sample("short").preview(8), "short");
    }

    #[test]
    fn test_message_json_is_camel_case() {
        let json = serde_json::to_value(sample("hi")).unwrap();
        assert!(json.get("isGroup").is_some());
        assert!(json.get("deletedBy").is_some());
        assert_eq!(json["status"][0]["status"], "sent");
    }

    #[test]
    fn test_pagination() {
        let pagination = Pagination::new(1, 20, 45);
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_more);

        let last = Pagination::new(3, 20, 45);
        assert!(!last.has_more);

        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_more);
    }
}
