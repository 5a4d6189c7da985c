//! HS256 token signing and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window lives in our own claim names and is checked by
        // `validate_claims` against the caller's clock.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Invalid(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Mints access tokens with a fixed lifetime.
pub struct Hs256JwtIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl Hs256JwtIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `claims` after stamping `issued_at = now` and `expires_at = now + ttl`.
    pub fn issue(&self, mut claims: JwtClaims, now: DateTime<Utc>) -> Result<(String, JwtClaims), TokenValidationError> {
        claims.issued_at = now;
        claims.expires_at = now + self.ttl;
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenValidationError::Encoding(e.to_string()))?;
        Ok((token, claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Permission, Role};
    use rentdesk_core::UserId;

    fn sample_claims() -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: UserId::new(),
            username: "jdoe".to_string(),
            roles: vec![Role::new("staff")],
            permissions: vec![Permission::new("customers.read")],
            issued_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn issued_token_validates_with_same_secret() {
        let issuer = Hs256JwtIssuer::new(b"s3cret", Duration::minutes(30));
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let now = Utc::now();

        let (token, issued) = issuer.issue(sample_claims(), now).unwrap();
        let decoded = validator.validate(&token, now + Duration::minutes(1)).unwrap();
        assert_eq!(decoded, issued);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = Hs256JwtIssuer::new(b"s3cret", Duration::minutes(30));
        let validator = Hs256JwtValidator::new(b"other".to_vec());
        let now = Utc::now();

        let (token, _) = issuer.issue(sample_claims(), now).unwrap();
        assert!(matches!(
            validator.validate(&token, now),
            Err(TokenValidationError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = Hs256JwtIssuer::new(b"s3cret", Duration::minutes(30));
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let now = Utc::now();

        let (token, _) = issuer.issue(sample_claims(), now).unwrap();
        assert_eq!(
            validator.validate(&token, now + Duration::minutes(31)),
            Err(TokenValidationError::Expired)
        );
    }
}
