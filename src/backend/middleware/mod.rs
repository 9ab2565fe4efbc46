//! Middleware Module
//!
//! This module contains request-processing pieces shared by all
//! authenticated routes.
//!
//! - **`auth`** - `AuthSession` extractor (token + live-session check) and
//!   `TokenIdentity` (signature only, for logout)
//!
//! # Example
//!
//! ```rust,ignore
//! async fn handler(session: AuthSession) -> impl IntoResponse {
//!     format!("user {} on device {}", session.user_id, session.device_id)
//! }
//! ```

pub mod auth;

pub use auth::{authenticate, AuthSession, TokenIdentity};
