//! Authentication Handlers Module
//!
//! # Module Structure
//!
//! ```text
//! handlers/
//! ├── mod.rs      - Module exports and documentation
//! ├── types.rs    - Request and response types
//! ├── signup.rs   - User registration handler
//! ├── login.rs    - Login and device session creation
//! ├── logout.rs   - Logout of one or all devices
//! └── sessions.rs - Session listing and remote revocation
//! ```
//!
//! # Handlers
//!
//! - **`signup`** - POST /api/auth/signup
//! - **`login`** - POST /api/auth/login
//! - **`logout`** - POST /api/auth/logout
//! - **`list_sessions`** - GET /api/auth/sessions
//! - **`revoke_device`** - DELETE /api/auth/sessions/{device_id}

/// Request and response types
pub mod types;

/// User registration handler
pub mod signup;

/// Login handler
pub mod login;

/// Logout handler
pub mod logout;

/// Session listing and revocation
pub mod sessions;

pub use login::login;
pub use logout::logout;
pub use sessions::{list_sessions, revoke_device};
pub use signup::signup;
