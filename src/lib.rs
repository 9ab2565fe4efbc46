//! XFChat - Main Library
//!
//! XFChat is a real-time chat backend built with Rust: direct and group
//! messaging with per-recipient delivery/read tracking, bounded multi-device
//! sessions, per-user soft delete, and a WebSocket channel that routes live
//! events to exactly the connected devices that should see them.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between clients and the server
//!   - Message, conversation, group and session records
//!   - Real-time event and client frame types
//!   - Application configuration and shared error types
//!
//! - **`backend`** - Server-side code
//!   - Session registry, conversation/group/message stores
//!   - Delivery status state machine
//!   - Presence & routing layer and the WebSocket endpoint
//!   - Axum routes, handlers, authentication and media upload
//!
//! # Usage
//!
//! ```rust,no_run
//! use xfchat::backend::server::create_app;
//! use xfchat::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let app = create_app(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! All server state is shared through `Arc` with `tokio` locks held only for
//! the duration of a single storage operation. There is no global lock:
//! session list mutations serialize per user, latest-message pointers per
//! container.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
pub mod backend;
