//! Sessions Module
//!
//! Device session control: each user holds at most
//! [`MAX_SESSIONS_PER_USER`] sessions, the oldest is evicted on overflow,
//! and every session can be revoked individually.
//!
//! - **`bounded`** - The sorted, capacity-enforcing session list
//! - **`registry`** - Storage-backed registry used by auth and the extractor

pub mod bounded;
pub mod registry;

pub use bounded::{SessionList, MAX_SESSIONS_PER_USER};
pub use registry::{CreatedSession, SessionRegistry};
