//! Messaging Module
//!
//! - **`store`** - Message Store; per-recipient status rows kept apart from messages
//! - **`status`** - Delivery state machine and per-viewer status views
//! - **`service`** - `ChatService`, the orchestration used by HTTP and WebSocket
//! - **`handlers`** - HTTP handlers

pub mod handlers;
pub mod service;
pub mod status;
pub mod store;

pub use service::ChatService;
pub use status::{aggregate_status, transition, view_for, MarkSeenOutcome, Transition};
pub use store::MessageStore;
