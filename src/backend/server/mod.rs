//! Server Module
//!
//! This module contains the code that assembles the Axum server.
//!
//! - **`state`** - `AppState`
//! - **`config`** - Storage backend selection and migrations
//! - **`init`** - App creation
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - Application state
//! ├── config.rs       - Backend loading (Postgres or memory)
//! └── init.rs         - Server initialization and app creation
//! ```

/// Application state management
pub mod state;

/// Storage backend loading
pub mod config;

/// Server initialization
pub mod init;

pub use init::{create_app, create_memory_app};
pub use state::AppState;
