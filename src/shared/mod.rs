//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! clients and the backend. These types are used for serialization over the
//! HTTP API and the real-time WebSocket channel.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types that can be used
//! in both server and client code. All types are designed for serialization
//! and transmission over HTTP.

/// Real-time event system
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Messaging types: messages, conversations, groups, sessions
pub mod messaging;

/// Re-export commonly used types for convenience
pub use event::{ClientFrame, EventType, RealtimeEvent};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError, MediaConfig};
