//! Direct conversations
//!
//! - **`store`** - Conversation Store (pair dedup, latest pointer, soft delete)
//! - **`handlers`** - HTTP handlers for opening, listing and hiding conversations

pub mod handlers;
pub mod store;

pub use store::ConversationStore;
