//! Media uploads backed by an external object store

pub mod client;
pub mod handlers;

pub use client::{MediaClient, MediaError};
