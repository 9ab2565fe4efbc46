/**
 * Authentication Handler Types
 *
 * Request and response bodies shared by the signup, login, logout and
 * session handlers.
 */

use serde::{Deserialize, Serialize};

use crate::backend::auth::users::UserProfile;

/// Sign up request
#[derive(Deserialize, Serialize, Debug)]
pub struct SignupRequest {
    /// 3-30 chars, alphanumeric + underscore, starting with a letter
    pub username: String,
    /// Hashed before storage
    pub password: String,
}

/// Login request
///
/// `ipAddress` and `deviceType` are optional; when absent they are taken from
/// the `X-Forwarded-For` and `User-Agent` headers.
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
}

/// Logout request; an empty body logs out the calling device only
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct LogoutRequest {
    #[serde(default)]
    pub all: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    pub user: UserProfile,
}

/// Returned by login. The token is bound to `device_id`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub device_id: String,
    pub user: UserProfile,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    /// Devices whose sessions were removed
    pub revoked: Vec<String>,
}
