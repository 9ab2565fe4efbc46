/**
 * Real-time Event System
 *
 * This module defines the frames exchanged over the WebSocket channel.
 * Server-to-client frames are `RealtimeEvent`s: new messages, status
 * updates, presence changes, deletions, group changes and forced logouts.
 * Client-to-server frames are `ClientFrame`s.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::messaging::{DeliveryStatus, Group, SendMessageRequest};

/// Type of real-time event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    /// New message for the recipient or a sender's other device
    Message,
    /// A recipient's delivery status advanced
    StatusUpdate,
    /// A contact went online or offline
    OnlineStatus,
    /// A message was deleted for everyone
    MessageDeleted,
    /// Group membership or settings changed
    GroupUpdate,
    /// This device was evicted or revoked; the client must log out
    SessionRevoked,
    /// Reply to a client ping
    Pong,
    /// A client frame could not be processed
    Error,
}

/// Real-time event pushed to connected devices
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    /// Type of event
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event payload (JSON-serializable data)
    pub payload: serde_json::Value,
    /// RFC3339 timestamp when the event was created
    pub timestamp: String,
}

impl RealtimeEvent {
    /// Create a new real-time event
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Create a message event from any serializable message view
    pub fn message<T: Serialize>(message: &T) -> Self {
        let payload = serde_json::to_value(message).unwrap_or(serde_json::Value::Null);
        Self::new(EventType::Message, payload)
    }

    /// Create a status update event
    pub fn status_update(
        message_id: Uuid,
        user_id: Uuid,
        status: DeliveryStatus,
        overall_status: DeliveryStatus,
    ) -> Self {
        Self::new(
            EventType::StatusUpdate,
            serde_json::json!({
                "messageId": message_id,
                "userId": user_id,
                "status": status,
                "overallStatus": overall_status,
            }),
        )
    }

    /// Create a presence event.
    ///
    /// `last_seen` is set when the user's last device disconnects.
    pub fn online_status(user_id: Uuid, online: bool, last_seen: Option<DateTime<Utc>>) -> Self {
        Self::new(
            EventType::OnlineStatus,
            serde_json::json!({
                "userId": user_id,
                "online": online,
                "lastSeen": last_seen.map(|at| at.to_rfc3339()),
            }),
        )
    }

    /// Create a delete-for-everyone event
    pub fn message_deleted(message_id: Uuid, container_id: Uuid, is_group: bool) -> Self {
        Self::new(
            EventType::MessageDeleted,
            serde_json::json!({
                "messageId": message_id,
                "containerId": container_id,
                "isGroup": is_group,
            }),
        )
    }

    /// Create a group change event carrying the group's new state
    pub fn group_update(group: &Group, action: &str) -> Self {
        Self::new(
            EventType::GroupUpdate,
            serde_json::json!({
                "action": action,
                "group": group,
            }),
        )
    }

    /// Create a forced-logout event for an evicted or revoked device
    pub fn session_revoked(device_id: &str) -> Self {
        Self::new(
            EventType::SessionRevoked,
            serde_json::json!({
                "deviceId": device_id,
                "forceLogout": true,
            }),
        )
    }

    pub fn pong() -> Self {
        Self::new(EventType::Pong, serde_json::Value::Null)
    }

    /// Create an error event for a rejected client frame
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            EventType::Error,
            serde_json::json!({ "message": message.into() }),
        )
    }
}

/// Frames a client may send over the WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Send a message; same shape as `POST /api/messages`
    SendMessage(SendMessageRequest),
    /// Mark a message as read
    #[serde(rename_all = "camelCase")]
    MarkSeen { message_id: Uuid },
    Ping,
}
