/**
 * Presence Registry
 *
 * Tracks the live connections of every user, one handle per device. A handle
 * is the sending half of that connection's outbound queue; the WebSocket
 * writer task drains the other half.
 *
 * Dropping a handle here closes the queue, which ends the writer and with it
 * the socket. Presence never touches the Session Registry: a dropped
 * connection leaves the device logged in.
 */
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::RealtimeEvent;

pub type EventSender = UnboundedSender<RealtimeEvent>;
pub type EventReceiver = UnboundedReceiver<RealtimeEvent>;

#[derive(Debug)]
struct ConnectionHandle {
    /// Distinguishes a reconnect of the same device from the old connection
    connection_id: Uuid,
    tx: EventSender,
}

/// A freshly registered connection
#[derive(Debug)]
pub struct Connected {
    pub connection_id: Uuid,
    pub receiver: EventReceiver,
    /// Replies from the connection's own inbound loop; does not keep the queue open
    pub replies: WeakUnboundedSender<RealtimeEvent>,
    /// True when no other device of the user was connected
    pub first_device: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PresenceRegistry {
    connections: Arc<RwLock<HashMap<Uuid, HashMap<String, ConnectionHandle>>>>,
    last_seen: Arc<RwLock<HashMap<Uuid, DateTime<Utc>>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device connection, replacing any previous one for the device
    pub async fn connect(&self, user_id: Uuid, device_id: &str) -> Connected {
        let (tx, receiver) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        let replies = tx.downgrade();

        let mut connections = self.connections.write().await;
        let devices = connections.entry(user_id).or_default();
        let first_device = devices.is_empty();
        let previous = devices.insert(device_id.to_string(), ConnectionHandle { connection_id, tx });
        if previous.is_some() {
            tracing::debug!("[Realtime] device {} of {} reconnected; old connection closed", device_id, user_id);
        }

        tracing::info!(
            "[Realtime] {} connected on {} ({} device(s) online)",
            user_id,
            device_id,
            devices.len()
        );
        Connected {
            connection_id,
            receiver,
            replies,
            first_device,
        }
    }

    /// Remove a connection if it is still the one registered for the device.
    ///
    /// Returns the last-seen time when this was the user's last device.
    pub async fn disconnect(&self, user_id: Uuid, device_id: &str, connection_id: Uuid) -> Option<DateTime<Utc>> {
        let mut connections = self.connections.write().await;
        let devices = connections.get_mut(&user_id)?;
        if devices.get(device_id).map(|h| h.connection_id) != Some(connection_id) {
            return None;
        }
        devices.remove(device_id);
        tracing::info!("[Realtime] {} disconnected from {}", user_id, device_id);
        self.went_offline(&mut connections, user_id).await
    }

    /// Push `event` to the device and close its connection
    pub async fn drop_device(&self, user_id: Uuid, device_id: &str, event: RealtimeEvent) -> Option<DateTime<Utc>> {
        let mut connections = self.connections.write().await;
        let devices = connections.get_mut(&user_id)?;
        let handle = devices.remove(device_id)?;
        if handle.tx.send(event).is_err() {
            tracing::warn!(
                "[Realtime] push to {} on {} failed: connection closed",
                user_id,
                device_id
            );
        }
        tracing::info!("[Realtime] closed connection of {} on {}", user_id, device_id);
        self.went_offline(&mut connections, user_id).await
    }

    async fn went_offline(
        &self,
        connections: &mut HashMap<Uuid, HashMap<String, ConnectionHandle>>,
        user_id: Uuid,
    ) -> Option<DateTime<Utc>> {
        if connections.get(&user_id).is_some_and(|d| !d.is_empty()) {
            return None;
        }
        connections.remove(&user_id);
        let now = Utc::now();
        self.last_seen.write().await.insert(user_id, now);
        Some(now)
    }

    /// Push to every connected device of the user except `except_device`.
    ///
    /// Returns how many devices accepted the event. Closed queues are logged
    /// and skipped.
    pub async fn push(&self, user_id: Uuid, event: &RealtimeEvent, except_device: Option<&str>) -> usize {
        let connections = self.connections.read().await;
        let Some(devices) = connections.get(&user_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (device_id, handle) in devices {
            if Some(device_id.as_str()) == except_device {
                continue;
            }
            match handle.tx.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(
                    "[Realtime] push to {} on {} failed: connection closed",
                    user_id,
                    device_id
                ),
            }
        }
        delivered
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.connections
            .read()
            .await
            .get(&user_id)
            .is_some_and(|devices| !devices.is_empty())
    }

    pub async fn connected_devices(&self, user_id: Uuid) -> Vec<String> {
        let mut devices: Vec<String> = self
            .connections
            .read()
            .await
            .get(&user_id)
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default();
        devices.sort();
        devices
    }

    pub async fn last_seen(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.last_seen.read().await.get(&user_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::EventType;

    #[tokio::test]
    async fn test_push_reaches_every_device_but_excluded() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let mut phone = presence.connect(user, "phone").await;
        let mut laptop = presence.connect(user, "laptop").await;
        assert!(phone.first_device);
        assert!(!laptop.first_device);

        let delivered = presence.push(user, &RealtimeEvent::pong(), Some("phone")).await;
        assert_eq!(delivered, 1);
        assert_eq!(laptop.receiver.recv().await.unwrap().event_type, EventType::Pong);
        assert!(phone.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_disconnect_keeps_new_connection() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let old = presence.connect(user, "phone").await;
        let _new = presence.connect(user, "phone").await;

        assert_eq!(presence.disconnect(user, "phone", old.connection_id).await, None);
        assert!(presence.is_online(user).await);
        assert_eq!(presence.connected_devices(user).await, vec!["phone".to_string()]);
    }

    #[tokio::test]
    async fn test_last_device_reports_offline() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let a = presence.connect(user, "a").await;
        let b = presence.connect(user, "b").await;

        assert!(presence.disconnect(user, "a", a.connection_id).await.is_none());
        let seen = presence.disconnect(user, "b", b.connection_id).await;
        assert!(seen.is_some());
        assert!(!presence.is_online(user).await);
        assert_eq!(presence.last_seen(user).await, seen);
    }

    #[tokio::test]
    async fn test_drop_device_sends_then_closes() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let mut conn = presence.connect(user, "tablet").await;

        presence
            .drop_device(user, "tablet", RealtimeEvent::session_revoked("tablet"))
            .await;
        assert_eq!(
            conn.receiver.recv().await.unwrap().event_type,
            EventType::SessionRevoked
        );
        // Sender dropped: the queue is closed
        assert!(conn.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_device_with_closed_queue_still_removes_handle() {
        let presence = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let conn = presence.connect(user, "tablet").await;
        drop(conn);

        let seen = presence
            .drop_device(user, "tablet", RealtimeEvent::session_revoked("tablet"))
            .await;
        assert!(seen.is_some());
        assert!(!presence.is_online(user).await);
    }

    #[tokio::test]
    async fn test_push_to_offline_user_is_noop() {
        let presence = PresenceRegistry::new();
        assert_eq!(presence.push(Uuid::new_v4(), &RealtimeEvent::pong(), None).await, 0);
    }
}
