//! Backend Module
//!
//! All server-side code: storage, the chat core, and the Axum surface.
//!
//! # Architecture
//!
//! - **`storage`** - `Backend` enum over Postgres or in-memory tables, read retry
//! - **`sessions`** - Session Registry (max 4 devices per user, oldest evicted)
//! - **`auth`** - User Directory, JWT tokens, `/api/auth` handlers
//! - **`conversations`** - Conversation Store and handlers
//! - **`groups`** - Group Store and handlers
//! - **`messaging`** - Message Store, delivery status machine, `ChatService`
//! - **`realtime`** - Presence Registry, Event Router, `/ws` endpoint
//! - **`media`** - Object storage client and upload handlers
//! - **`middleware`** - `AuthSession` extractor
//! - **`routes`** - Router assembly
//! - **`server`** - Application state and startup
//! - **`error`** - `BackendError` and its HTTP mapping
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── storage/        - Storage backends
//! ├── sessions/       - Device sessions
//! ├── auth/           - Authentication
//! ├── conversations/  - Direct conversations
//! ├── groups/         - Groups
//! ├── messaging/      - Messages and delivery status
//! ├── realtime/       - Presence and event routing
//! ├── media/          - Media uploads
//! ├── middleware/     - Request extractors
//! └── error/          - Error types
//! ```
//!
//! # Thread Safety
//!
//! Components are `Clone` handles over shared state. Per-user session lists
//! and per-message status lists are mutated under their own locks (memory)
//! or row locks (Postgres); real-time pushes never hold a storage lock.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Storage backends
pub mod storage;

/// Device session management
pub mod sessions;

/// Authentication and user management
pub mod auth;

/// Direct conversations
pub mod conversations;

/// Group chats
pub mod groups;

/// Messages and delivery status
pub mod messaging;

/// Presence and real-time event routing
pub mod realtime;

/// Media uploads
pub mod media;

/// Request extractors
pub mod middleware;

/// Backend error types
pub mod error;

/// Re-export commonly used types
pub use error::BackendError;
pub use server::{create_app, create_memory_app, AppState};
