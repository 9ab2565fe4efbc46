//! Messaging Module
//!
//! This module contains all the data structures for the chat system:
//!
//! - `Message` - A message in a direct conversation or a group
//! - `Conversation` - A direct conversation between two users
//! - `Group` - A named multi-member chat with admins
//! - `Session` - One logged-in device
//!
//! # Usage
//!
//! ```rust
//! use xfchat::shared::messaging::{Conversation, DeliveryStatus, Group, Message};
//! ```

pub mod message;
pub mod conversation;
pub mod group;
pub mod session;

// Re-export all types
pub use message::{
    Container, DeleteMessageQuery, DeliveryStatus, Message, MessagePage, MessageType,
    MessageView, PageQuery, Pagination, SearchQuery, SendMessageRequest, StatusEntry,
};
pub use conversation::{
    pair_key, Conversation, ConversationSummary, ListConversationsResponse,
    OpenConversationRequest,
};
pub use group::{
    AddMembersRequest, CreateGroupRequest, Group, GroupSettingsRequest, ListGroupsResponse,
};
pub use session::{DeviceMeta, ListSessionsResponse, Session, SessionView};
