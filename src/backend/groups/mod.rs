//! Groups
//!
//! - **`store`** - Group Store (membership, admins, posting permission)
//! - **`handlers`** - HTTP handlers; every mutation pushes a `groupUpdate`

pub mod handlers;
pub mod store;

pub use store::GroupStore;
