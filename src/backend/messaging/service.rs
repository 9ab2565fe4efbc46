/**
 * Chat Service
 *
 * Orchestrates the component stores for every messaging operation exposed
 * over HTTP and the WebSocket: validation and authorization first, then the
 * write, then routing of the resulting events.
 *
 * # Send Atomicity
 *
 * The message and its status rows are written together. If moving the
 * container's latest pointer fails afterwards, the message is purged again so
 * a failed send leaves nothing behind.
 */
use chrono::Utc;
use uuid::Uuid;

use crate::backend::auth::users::UserDirectory;
use crate::backend::conversations::ConversationStore;
use crate::backend::error::BackendError;
use crate::backend::groups::GroupStore;
use crate::backend::messaging::status::{view_for, MarkSeenOutcome};
use crate::backend::messaging::store::MessageStore;
use crate::backend::realtime::EventRouter;
use crate::backend::sessions::SessionRegistry;
use crate::shared::messaging::{
    Container, Conversation, ConversationSummary, DeliveryStatus, Group, Message, MessagePage,
    MessageView, PageQuery, Pagination, SearchQuery, SendMessageRequest, StatusEntry,
};

const MAX_CONTENT_CHARS: usize = 10_000;

#[derive(Clone, Debug)]
pub struct ChatService {
    users: UserDirectory,
    sessions: SessionRegistry,
    conversations: ConversationStore,
    groups: GroupStore,
    messages: MessageStore,
    events: EventRouter,
    default_page_size: u32,
    max_page_size: u32,
}

/// Where a message goes and who gets a status entry
struct Route {
    container: Container,
    receiver: Option<Uuid>,
    recipients: Vec<Uuid>,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: UserDirectory,
        sessions: SessionRegistry,
        conversations: ConversationStore,
        groups: GroupStore,
        messages: MessageStore,
        events: EventRouter,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Self {
        Self {
            users,
            sessions,
            conversations,
            groups,
            messages,
            events,
            default_page_size,
            max_page_size,
        }
    }

    /// Persist a message and push it to connected recipients
    pub async fn send_message(
        &self,
        sender: Uuid,
        sender_device: Option<&str>,
        request: SendMessageRequest,
    ) -> Result<MessageView, BackendError> {
        let content = request.content.trim().to_string();
        let media_url = request.media_url.filter(|url| !url.trim().is_empty());
        if content.is_empty() && media_url.is_none() {
            return Err(BackendError::invalid("content", "Message content cannot be empty"));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(BackendError::invalid("content", "Message content is too long"));
        }
        if request.message_type.requires_media() && media_url.is_none() {
            return Err(BackendError::invalid(
                "mediaUrl",
                format!("A {} message requires a media URL", request.message_type.as_str()),
            ));
        }

        let route = if request.is_group {
            self.group_route(sender, request.target).await?
        } else {
            self.direct_route(sender, request.target).await?
        };

        if let Some(reply_to) = request.reply_to {
            let original = self.messages.get(reply_to).await?;
            if original.and_then(|m| m.container()) != Some(route.container) {
                return Err(BackendError::invalid(
                    "replyTo",
                    "Replies must reference a message in the same conversation",
                ));
            }
        }

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            sender,
            receiver: route.receiver,
            conversation_id: (!route.container.is_group()).then(|| route.container.id()),
            group_id: route.container.is_group().then(|| route.container.id()),
            is_group: route.container.is_group(),
            content,
            message_type: request.message_type,
            media_url,
            reply_to_message_id: request.reply_to,
            status: route.recipients.iter().map(|r| StatusEntry::sent(*r, now)).collect(),
            deleted_by: Vec::new(),
            is_deleted: false,
            encrypted: true,
            timestamp: now,
        };

        self.messages.insert(&message).await?;

        let pointer = match (route.container, route.receiver) {
            (Container::Direct(id), Some(receiver)) => {
                self.conversations
                    .record_new_message(id, message.id, now, receiver)
                    .await
            }
            (Container::Group(id), _) => self.groups.record_new_message(id, message.id, now).await,
            (Container::Direct(_), None) => Ok(()),
        };
        if let Err(err) = pointer {
            tracing::error!("[Messaging] latest pointer update failed for {}: {}", message.id, err);
            if let Err(purge_err) = self.messages.purge(message.id).await {
                tracing::error!("[Messaging] could not purge message {}: {}", message.id, purge_err);
            }
            return Err(err);
        }

        tracing::info!(
            "[Messaging] {} sent {} to {:?} ({} recipient(s))",
            sender,
            message.id,
            route.container,
            route.recipients.len()
        );

        self.events
            .route_new_message(&message, &route.recipients, sender_device)
            .await;
        Ok(view_for(message, sender))
    }

    async fn direct_route(&self, sender: Uuid, target: Uuid) -> Result<Route, BackendError> {
        if sender == target {
            return Err(BackendError::invalid("target", "Cannot send a message to yourself"));
        }
        if self.users.get(target).await?.is_none() {
            return Err(BackendError::not_found("User not found"));
        }
        let conversation = self.conversations.find_or_create_direct(sender, target).await?;
        Ok(Route {
            container: Container::Direct(conversation.id),
            receiver: Some(target),
            recipients: vec![target],
        })
    }

    async fn group_route(&self, sender: Uuid, group_id: Uuid) -> Result<Route, BackendError> {
        let group = self.groups.require(group_id).await?;
        if !group.is_member(sender) {
            return Err(BackendError::forbidden("You are not a member of this group"));
        }
        if !group.can_post(sender) {
            return Err(BackendError::forbidden("Only admins can send messages in this group"));
        }
        Ok(Route {
            container: Container::Group(group.id),
            receiver: None,
            recipients: group.participants().into_iter().filter(|id| *id != sender).collect(),
        })
    }

    /// Mark a message as read by `reader`. Repeats are no-ops.
    pub async fn mark_seen(&self, reader: Uuid, message_id: Uuid) -> Result<MarkSeenOutcome, BackendError> {
        let message = self.require_live_message(message_id).await?;

        let allowed = match message.container() {
            Some(Container::Direct(_)) => message.receiver == Some(reader),
            Some(Container::Group(group_id)) => self.groups.is_authorized_viewer(group_id, reader).await?,
            None => false,
        };
        if !allowed {
            return Err(BackendError::forbidden("You cannot mark this message as seen"));
        }

        let transition = self
            .messages
            .apply_status(message_id, reader, DeliveryStatus::Read)
            .await?;
        let outcome = MarkSeenOutcome::from_transition(transition);

        if outcome.changed() {
            tracing::debug!("[Messaging] {} read {}", reader, message_id);
            if let Some(updated) = self.messages.get(message_id).await? {
                self.events
                    .route_status_update(&updated, reader, DeliveryStatus::Read)
                    .await;
            }
        }
        Ok(outcome)
    }

    /// Delete for the caller only, or for everyone when they sent it
    pub async fn delete_message(&self, user_id: Uuid, message_id: Uuid, for_everyone: bool) -> Result<(), BackendError> {
        let message = self.require_live_message(message_id).await?;
        let participants = self.participants_of(&message).await?;
        if !participants.contains(&user_id) {
            return Err(BackendError::forbidden("You cannot delete this message"));
        }

        if !for_everyone {
            self.messages.delete_for_user(message_id, user_id).await?;
            tracing::debug!("[Messaging] {} hid {}", user_id, message_id);
            return Ok(());
        }

        if message.sender != user_id {
            return Err(BackendError::forbidden("Only the sender can delete a message for everyone"));
        }
        if !self.messages.delete_for_everyone(message_id).await? {
            return Err(BackendError::not_found("Message not found"));
        }
        tracing::info!("[Messaging] {} deleted {} for everyone", user_id, message_id);
        self.events.route_deleted(&message, &participants).await;
        Ok(())
    }

    /// One page of a conversation or group, newest first
    pub async fn fetch_page(&self, viewer: Uuid, container: Container, query: PageQuery) -> Result<MessagePage, BackendError> {
        self.authorize_container(viewer, container).await?;

        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);

        let (messages, total) = self.messages.page(container, viewer, page, page_size).await?;
        Ok(MessagePage {
            messages: messages.into_iter().map(|m| view_for(m, viewer)).collect(),
            pagination: Pagination::new(page, page_size, total),
        })
    }

    pub async fn search_messages(&self, viewer: Uuid, query: SearchQuery) -> Result<Vec<MessageView>, BackendError> {
        let needle = query.q.trim();
        if needle.is_empty() {
            return Err(BackendError::invalid("q", "Search text cannot be empty"));
        }
        let container = if query.is_group {
            Container::Group(query.container_id)
        } else {
            Container::Direct(query.container_id)
        };
        self.authorize_container(viewer, container).await?;

        let found = self
            .messages
            .search(container, viewer, needle, self.max_page_size)
            .await?;
        Ok(found.into_iter().map(|m| view_for(m, viewer)).collect())
    }

    pub async fn open_conversation(&self, user_id: Uuid, other_user_id: Uuid) -> Result<Conversation, BackendError> {
        if user_id == other_user_id {
            return Err(BackendError::invalid("otherUserId", "Cannot open a conversation with yourself"));
        }
        if self.users.get(other_user_id).await?.is_none() {
            return Err(BackendError::not_found("User not found"));
        }
        self.conversations.find_or_create_direct(user_id, other_user_id).await
    }

    /// Visible conversations with a preview of the latest visible message
    pub async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>, BackendError> {
        let conversations = self.conversations.list_for_user(user_id).await?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(other_user_id) = conversation.other_participant(user_id) else {
                continue;
            };
            let latest_message = match conversation.latest_message_id {
                Some(id) => self
                    .messages
                    .get(id)
                    .await?
                    .filter(|m| m.is_visible_to(user_id))
                    .map(|m| view_for(m, user_id)),
                None => None,
            };
            summaries.push(ConversationSummary {
                conversation,
                other_user_id,
                latest_message,
            });
        }
        Ok(summaries)
    }

    /// Hide the conversation with `other_user_id` for the caller
    pub async fn delete_conversation(&self, user_id: Uuid, other_user_id: Uuid) -> Result<(), BackendError> {
        let conversation = self
            .conversations
            .find_direct(user_id, other_user_id)
            .await?
            .ok_or_else(|| BackendError::not_found("Conversation not found"))?;
        self.conversations.soft_delete(conversation.id, user_id).await
    }

    pub async fn create_group(&self, creator: Uuid, name: &str, member_ids: &[Uuid]) -> Result<Group, BackendError> {
        let group = self.groups.create(name, creator, member_ids).await?;
        self.events.route_group_update(&group, "created", &[]).await;
        Ok(group)
    }

    pub async fn add_group_members(&self, group_id: Uuid, admin_id: Uuid, member_ids: &[Uuid]) -> Result<Group, BackendError> {
        let group = self.groups.add_members(group_id, admin_id, member_ids).await?;
        self.events.route_group_update(&group, "membersAdded", &[]).await;
        Ok(group)
    }

    pub async fn remove_group_member(&self, group_id: Uuid, admin_id: Uuid, user_id: Uuid) -> Result<Group, BackendError> {
        let group = self.groups.remove_member(group_id, admin_id, user_id).await?;
        self.events.route_group_update(&group, "memberRemoved", &[user_id]).await;
        Ok(group)
    }

    pub async fn promote_group_admin(&self, group_id: Uuid, admin_id: Uuid, user_id: Uuid) -> Result<Group, BackendError> {
        let group = self.groups.promote_admin(group_id, admin_id, user_id).await?;
        self.events.route_group_update(&group, "adminPromoted", &[]).await;
        Ok(group)
    }

    pub async fn set_group_messaging(&self, group_id: Uuid, admin_id: Uuid, can_send_messages: bool) -> Result<Group, BackendError> {
        let group = self
            .groups
            .set_messaging_permission(group_id, admin_id, can_send_messages)
            .await?;
        self.events.route_group_update(&group, "settingsChanged", &[]).await;
        Ok(group)
    }

    pub async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> Result<Group, BackendError> {
        let group = self.groups.leave_group(group_id, user_id).await?;
        self.events.route_group_update(&group, "memberLeft", &[user_id]).await;
        Ok(group)
    }

    pub async fn delete_group(&self, group_id: Uuid, admin_id: Uuid) -> Result<Group, BackendError> {
        let group = self.groups.delete_group(group_id, admin_id).await?;
        self.events.route_group_update(&group, "deleted", &[]).await;
        Ok(group)
    }

    pub async fn list_groups(&self, user_id: Uuid) -> Result<Vec<Group>, BackendError> {
        self.groups.list_for_user(user_id).await
    }

    /// Suspend an account and sign out all of its devices
    pub async fn suspend_user(&self, user_id: Uuid) -> Result<(), BackendError> {
        self.users.set_suspended(user_id, true).await?;
        let revoked = self.sessions.revoke_all_sessions(user_id).await?;
        self.events.close_sessions(user_id, &revoked).await;
        tracing::warn!("[Auth] suspended {} and revoked {} session(s)", user_id, revoked.len());
        Ok(())
    }

    async fn require_live_message(&self, message_id: Uuid) -> Result<Message, BackendError> {
        self.messages
            .get(message_id)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or_else(|| BackendError::not_found("Message not found"))
    }

    /// Everyone who can see the message's container
    async fn participants_of(&self, message: &Message) -> Result<Vec<Uuid>, BackendError> {
        match message.container() {
            Some(Container::Direct(_)) => Ok(std::iter::once(message.sender).chain(message.receiver).collect()),
            Some(Container::Group(group_id)) => {
                let mut participants = match self.groups.get(group_id).await? {
                    Some(group) => group.participants(),
                    None => Vec::new(),
                };
                if !participants.contains(&message.sender) {
                    participants.push(message.sender);
                }
                Ok(participants)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn authorize_container(&self, viewer: Uuid, container: Container) -> Result<(), BackendError> {
        match container {
            Container::Direct(id) => {
                let conversation = self
                    .conversations
                    .get(id)
                    .await?
                    .ok_or_else(|| BackendError::not_found("Conversation not found"))?;
                if !conversation.has_participant(viewer) {
                    return Err(BackendError::forbidden("You are not part of this conversation"));
                }
            }
            Container::Group(id) => {
                let group = self.groups.require(id).await?;
                if !group.is_authorized_viewer(viewer) {
                    return Err(BackendError::forbidden("You are not a member of this group"));
                }
            }
        }
        Ok(())
    }
}
