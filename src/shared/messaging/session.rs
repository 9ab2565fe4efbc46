//! Device Session Data Structure
//!
//! A session represents one logged-in device for one user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One active device login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub device_id: String,
    pub login_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub device_type: Option<String>,
}

/// Descriptive metadata supplied by the client when logging in
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMeta {
    pub ip_address: Option<String>,
    pub device_type: Option<String>,
}

impl Session {
    pub fn new(device_id: impl Into<String>, login_at: DateTime<Utc>, meta: DeviceMeta) -> Self {
        Self {
            device_id: device_id.into(),
            login_at,
            ip_address: meta.ip_address,
            device_type: meta.device_type,
        }
    }
}

/// A session as listed to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    /// Whether this is the device making the request
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionView>,
}
