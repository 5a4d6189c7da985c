use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rentdesk_core::UserId;

use crate::{Permission, Role};

/// JWT claims model (transport-agnostic).
///
/// Permissions are resolved from the user's roles and direct grants when the
/// token is issued; a role change takes effect on the next login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    pub username: String,

    /// RBAC roles held by the user.
    pub roles: Vec<Role>,

    /// Effective permissions at issue time.
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed or badly signed token: {0}")]
    Invalid(String),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims_at(issued_at: DateTime<Utc>, ttl_minutes: i64) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            username: "jdoe".to_string(),
            roles: vec![Role::new("staff")],
            permissions: vec![],
            issued_at,
            expires_at: issued_at + Duration::minutes(ttl_minutes),
        }
    }

    #[test]
    fn window_is_enforced() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let claims = claims_at(t0, 30);

        assert_eq!(validate_claims(&claims, t0), Ok(()));
        assert_eq!(
            validate_claims(&claims, t0 - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims, t0 + Duration::minutes(30)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims_at(t0, 0), t0),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
