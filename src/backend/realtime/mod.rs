//! Real-time Module
//!
//! Presence and routing for live device connections.
//!
//! - **`presence`** - `PresenceRegistry`: live connection handles per user and device
//! - **`routing`** - `EventRouter`: decides who receives each event
//! - **`socket`** - The `/ws` endpoint and its per-connection tasks
//!
//! Pushes are fire-and-forget. A failed push is logged and never fails the
//! write that triggered it.

pub mod presence;
pub mod routing;
pub mod socket;

pub use presence::{Connected, PresenceRegistry};
pub use routing::EventRouter;
pub use socket::{attach_device, ws_handler};
