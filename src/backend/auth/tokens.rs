/**
 * Session Tokens
 *
 * This module issues and verifies the signed bearer tokens that bind a
 * request to `{user_id, device_id}`. A valid token alone does not
 * authenticate a request: the device must also still hold a live session
 * (see `SessionRegistry::is_valid_session`).
 */
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::error::{BackendError, UnauthorizedReason};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Device session this token belongs to
    pub device_id: String,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, BackendError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| BackendError::unauthorized(UnauthorizedReason::InvalidToken))
    }
}

/// HS256 token issuer and verifier
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("ttl", &self.ttl).finish()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Create a token for one device session
    pub fn issue(&self, user_id: Uuid, device_id: &str) -> Result<String, BackendError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            device_id: device_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!("[Auth] failed to sign token: {:?}", e);
            BackendError::upstream("token issuer unavailable")
        })
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, BackendError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        self.decode_with(token, &validation)
    }

    /// Verify the signature only; an expired token still yields its claims
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<Claims, BackendError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        self.decode_with(token, &validation)
    }

    fn decode_with(&self, token: &str, validation: &Validation) -> Result<Claims, BackendError> {
        decode::<Claims>(token, &self.decoding, validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    BackendError::unauthorized(UnauthorizedReason::TokenExpired)
                }
                _ => {
                    tracing::debug!("[Auth] rejected token: {:?}", e);
                    BackendError::unauthorized(UnauthorizedReason::InvalidToken)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", Duration::hours(1))
    }

    #[test]
    fn test_issue_and_verify() {
        let user_id = Uuid::new_v4();
        let token = issuer().issue(user_id, "device-1").unwrap();
        let claims = issuer().verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.device_id, "device-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token() {
        let expired = TokenIssuer::new("test-secret", Duration::hours(-2));
        let token = expired.issue(Uuid::new_v4(), "device-1").unwrap();
        assert_matches!(
            issuer().verify(&token),
            Err(BackendError::Unauthorized { reason: UnauthorizedReason::TokenExpired })
        );
    }

    #[test]
    fn test_expired_token_still_names_its_device() {
        let user_id = Uuid::new_v4();
        let expired = TokenIssuer::new("test-secret", Duration::hours(-2));
        let token = expired.issue(user_id, "device-1").unwrap();

        let claims = issuer().verify_ignoring_expiry(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.device_id, "device-1");

        let forged = TokenIssuer::new("other-secret", Duration::hours(-2))
            .issue(user_id, "device-1")
            .unwrap();
        assert_matches!(
            issuer().verify_ignoring_expiry(&forged),
            Err(BackendError::Unauthorized { reason: UnauthorizedReason::InvalidToken })
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let other = TokenIssuer::new("other-secret", Duration::hours(1));
        let token = other.issue(Uuid::new_v4(), "device-1").unwrap();
        assert_matches!(
            issuer().verify(&token),
            Err(BackendError::Unauthorized { reason: UnauthorizedReason::InvalidToken })
        );
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_matches!(
            issuer().verify("invalid.token.here"),
            Err(BackendError::Unauthorized { reason: UnauthorizedReason::InvalidToken })
        );
    }
}
