/**
 * Event Routing
 *
 * Decides who receives each real-time event and hands it to the Presence
 * Registry. Routing runs only after persistence has succeeded and never
 * fails the caller: an offline recipient simply misses the push and catches
 * up through paging.
 */
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::conversations::ConversationStore;
use crate::backend::messaging::status::view_for;
use crate::backend::realtime::presence::PresenceRegistry;
use crate::shared::messaging::{DeliveryStatus, Group, Message, Session};
use crate::shared::RealtimeEvent;

#[derive(Clone, Debug)]
pub struct EventRouter {
    presence: PresenceRegistry,
    conversations: ConversationStore,
}

impl EventRouter {
    pub fn new(presence: PresenceRegistry, conversations: ConversationStore) -> Self {
        Self { presence, conversations }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    /// Fan a new message out to its recipients and to the sender's other devices
    pub async fn route_new_message(&self, message: &Message, recipients: &[Uuid], sender_device: Option<&str>) {
        let mut delivered = 0;
        for recipient in recipients {
            let event = RealtimeEvent::message(&view_for(message.clone(), *recipient));
            delivered += self.presence.push(*recipient, &event, None).await;
        }

        let echo = RealtimeEvent::message(&view_for(message.clone(), message.sender));
        delivered += self.presence.push(message.sender, &echo, sender_device).await;

        tracing::debug!("[Realtime] message {} pushed to {} connection(s)", message.id, delivered);
    }

    /// Tell every device of the sender that a recipient's status moved
    pub async fn route_status_update(&self, message: &Message, reader: Uuid, status: DeliveryStatus) {
        let overall = view_for(message.clone(), message.sender).overall_status;
        let event = RealtimeEvent::status_update(message.id, reader, status, overall);
        self.presence.push(message.sender, &event, None).await;
    }

    pub async fn route_deleted(&self, message: &Message, participants: &[Uuid]) {
        let Some(container) = message.container() else {
            return;
        };
        let event = RealtimeEvent::message_deleted(message.id, container.id(), container.is_group());
        for user_id in participants {
            self.presence.push(*user_id, &event, None).await;
        }
    }

    /// Push the group's new state to its members and to anyone in `also`
    pub async fn route_group_update(&self, group: &Group, action: &str, also: &[Uuid]) {
        let event = RealtimeEvent::group_update(group, action);
        let mut targets = group.participants();
        for extra in also {
            if !targets.contains(extra) {
                targets.push(*extra);
            }
        }
        for user_id in targets {
            self.presence.push(user_id, &event, None).await;
        }
    }

    /// Notify connected conversation partners that `user_id` went online or offline
    pub async fn announce_presence(&self, user_id: Uuid, online: bool, last_seen: Option<DateTime<Utc>>) {
        let partners = match self.conversations.partners_of(user_id).await {
            Ok(partners) => partners,
            Err(err) => {
                tracing::warn!("[Realtime] could not load partners of {}: {}", user_id, err);
                return;
            }
        };

        let event = RealtimeEvent::online_status(user_id, online, last_seen);
        for partner in partners {
            self.presence.push(partner, &event, None).await;
        }
    }

    /// Close the live connections of revoked or evicted sessions
    pub async fn close_sessions(&self, user_id: Uuid, sessions: &[Session]) {
        for session in sessions {
            let event = RealtimeEvent::session_revoked(&session.device_id);
            if let Some(last_seen) = self.presence.drop_device(user_id, &session.device_id, event).await {
                self.announce_presence(user_id, false, Some(last_seen)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::Backend;
    use crate::shared::messaging::{MessageType, StatusEntry};
    use crate::shared::EventType;

    fn router() -> (EventRouter, ConversationStore) {
        let conversations = ConversationStore::new(Backend::memory());
        (
            EventRouter::new(PresenceRegistry::new(), conversations.clone()),
            conversations,
        )
    }

    fn direct(conversation_id: Uuid, sender: Uuid, receiver: Uuid) -> Message {
        let now = Utc::now();
        Message {
            id: Uuid::new_v4(),
            sender,
            receiver: Some(receiver),
            conversation_id: Some(conversation_id),
            group_id: None,
            is_group: false,
            content: "hi".into(),
            message_type: MessageType::Text,
            media_url: None,
            reply_to_message_id: None,
            status: vec![StatusEntry::sent(receiver, now)],
            deleted_by: Vec::new(),
            is_deleted: false,
            encrypted: true,
            timestamp: now,
        }
    }

    #[tokio::test]
    async fn test_new_message_echoes_to_other_sender_devices() {
        let (router, _) = router();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut d1 = router.presence().connect(alice, "d1").await;
        let mut d1b = router.presence().connect(alice, "d1b").await;
        let mut d2 = router.presence().connect(bob, "d2").await;

        let message = direct(Uuid::new_v4(), alice, bob);
        router.route_new_message(&message, &[bob], Some("d1")).await;

        let to_bob = d2.receiver.recv().await.unwrap();
        assert_eq!(to_bob.payload["isYour"], false);
        let echo = d1b.receiver.recv().await.unwrap();
        assert_eq!(echo.payload["isYour"], true);
        assert!(d1.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_presence_goes_to_partners_only() {
        let (router, conversations) = router();
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        conversations.find_or_create_direct(alice, bob).await.unwrap();
        let mut bob_conn = router.presence().connect(bob, "b").await;
        let mut carol_conn = router.presence().connect(carol, "c").await;

        router.announce_presence(alice, true, None).await;

        let event = bob_conn.receiver.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::OnlineStatus);
        assert_eq!(event.payload["online"], true);
        assert!(carol_conn.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_sessions_forces_logout() {
        let (router, _) = router();
        let alice = Uuid::new_v4();
        let mut conn = router.presence().connect(alice, "old").await;
        let session = Session {
            device_id: "old".into(),
            login_at: Utc::now(),
            ip_address: None,
            device_type: None,
        };

        router.close_sessions(alice, &[session]).await;
        let event = conn.receiver.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::SessionRevoked);
        assert!(!router.presence().is_online(alice).await);
    }
}
