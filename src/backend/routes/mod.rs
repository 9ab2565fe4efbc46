//! Route Configuration Module
//!
//! - **`router`** - Main router creation, layers, `/health` and `/ws`
//! - **`api_routes`** - The `/api` endpoints
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! └── api_routes.rs   - API endpoint table
//! ```

/// Main router creation
pub mod router;

/// API endpoint table
pub mod api_routes;

pub use router::create_router;
