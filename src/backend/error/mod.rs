//! Backend Error Module
//!
//! This module defines the error taxonomy every backend operation reports.
//! These errors are returned from HTTP handlers and converted to responses.
//!
//! # Architecture
//!
//! The error module is organized into focused submodules:
//!
//! - **`types`** - Error type definitions and constructors
//! - **`conversion`** - Error conversion implementations (IntoResponse, From)
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - Error conversion implementations
//! ```
//!
//! # Error Types
//!
//! - `Unauthorized` - Missing, invalid, expired or remotely revoked session
//! - `Forbidden` - Valid session, insufficient permission
//! - `NotFound` - Message, conversation, group or user absent or deleted
//! - `InvalidInput` - Validation failures from the shared module
//! - `Conflict` - Duplicate resource
//! - `Upstream` - Storage write, object-storage or token-issuer failure
//!
//! # HTTP Response Conversion
//!
//! `BackendError` implements `IntoResponse` from Axum, so handlers return it
//! directly. The body is JSON carrying a message, a stable code, and the
//! status.
//!
//! # Example
//!
//! ```rust
//! use xfchat::backend::error::BackendError;
//!
//! let err = BackendError::forbidden("Messaging is disabled in this group");
//! assert_eq!(err.status_code().as_u16(), 403);
//! ```

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::{BackendError, UnauthorizedReason};
