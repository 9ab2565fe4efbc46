//! Authentication Module
//!
//! User accounts, credential checks, JWT issuance, and the HTTP handlers for
//! the `/api/auth` endpoints. Device sessions themselves live in
//! [`crate::backend::sessions`].
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! ├── users.rs        - User Directory (accounts, bcrypt, suspension)
//! ├── tokens.rs       - JWT issuance and verification
//! └── handlers/       - HTTP handlers
//! ```
//!
//! # Authentication Flow
//!
//! 1. **Signup**: username and password → user created
//! 2. **Login**: credentials verified → device session created → JWT bound to the device returned
//! 3. **Every request**: JWT verified → device session checked against the Session Registry
//!
//! # Security
//!
//! - Passwords are hashed using bcrypt before storage
//! - Revoking a session invalidates its token immediately
//! - Invalid credentials return 401 (no information leakage)

/// User data model and storage operations
pub mod users;

/// JWT token generation and validation
pub mod tokens;

/// HTTP handlers for authentication endpoints
pub mod handlers;

pub use handlers::types::{AuthResponse, LoginRequest, LogoutRequest, SignupRequest};
pub use tokens::{Claims, TokenIssuer};
pub use users::{UserAccount, UserDirectory, UserProfile};
