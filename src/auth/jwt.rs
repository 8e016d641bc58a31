//! Session token issuance and verification (HS256).

use chrono::{DateTime, TimeZone, Utc};
use jwt_simple::prelude::*;
use jwt_simple::JWTError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TokenError;

/// Custom claims carried next to the registered `exp`/`iat` claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "userName", default)]
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64,
    pub user_name: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies tokens signed with a shared secret.
///
/// There is no refresh or revocation: a token stays valid until `exp`.
#[derive(Clone)]
pub struct TokenService {
    key: HS256Key,
    ttl_hours: u64,
}

impl TokenService {
    pub fn new(signing_key: &str, ttl_hours: u64) -> Self {
        Self {
            key: HS256Key::from_bytes(signing_key.as_bytes()),
            ttl_hours,
        }
    }

    pub fn ttl_hours(&self) -> u64 {
        self.ttl_hours
    }

    /// Signs a token for `user_id` that expires `ttl_hours` from now.
    pub fn create_token(&self, user_id: i64, ttl_hours: u64) -> Result<IssuedToken, TokenError> {
        self.create_token_for(user_id, "", ttl_hours)
    }

    pub fn create_token_for(
        &self,
        user_id: i64,
        user_name: &str,
        ttl_hours: u64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = jwt_simple::claims::Claims::with_custom_claims(
            SessionClaims {
                user_id,
                user_name: user_name.to_string(),
            },
            Duration::from_hours(ttl_hours),
        );
        self.sign(claims)
    }

    fn sign(
        &self,
        claims: JWTClaims<SessionClaims>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_secs = claims.expires_at.map(|t| t.as_secs()).unwrap_or(0) as i64;
        let value = self
            .key
            .authenticate(claims)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            value,
            expires_at: Utc
                .timestamp_opt(expires_secs, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let options = VerificationOptions {
            time_tolerance: Some(Duration::from_secs(0)),
            ..Default::default()
        };

        let token_data = self
            .key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(classify)?;

        Ok(Claims {
            user_id: token_data.custom.user_id,
            user_name: token_data.custom.user_name,
            expires_at: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}

fn classify(err: jwt_simple::Error) -> TokenError {
    let kind = match err.downcast_ref::<JWTError>() {
        Some(JWTError::InvalidAuthenticationTag) | Some(JWTError::InvalidSignature) => {
            TokenError::SignatureInvalid
        }
        Some(JWTError::TokenHasExpired) => TokenError::Expired,
        _ => TokenError::Malformed,
    };
    debug!(error = %err, ?kind, "Token verification failed");
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "sidekiq-unit-test-key";

    #[test]
    fn test_create_and_verify_round_trip() {
        let service = TokenService::new(KEY, 24);
        let issued = service.create_token_for(42, "ada", 24).unwrap();

        let claims = service.verify_token(&issued.value).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.user_name, "ada");
        assert_eq!(claims.expires_at, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expiry_is_ttl_hours_from_now() {
        let service = TokenService::new(KEY, 24);
        let before = Utc::now().timestamp();
        let issued = service.create_token(7, 2).unwrap();

        let delta = issued.expires_at.timestamp() - before;
        assert!((7199..=7201).contains(&delta), "delta was {delta}");
    }

    #[test]
    fn test_wrong_key_is_signature_invalid() {
        let issuer = TokenService::new(KEY, 24);
        let other = TokenService::new("another-key", 24);
        let issued = issuer.create_token(1, 1).unwrap();

        assert_eq!(
            other.verify_token(&issued.value),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = TokenService::new(KEY, 24);
        assert_eq!(service.verify_token("bad.jwt"), Err(TokenError::Malformed));
        assert_eq!(service.verify_token(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::new(KEY, 24);
        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            SessionClaims {
                user_id: 3,
                user_name: String::new(),
            },
            Duration::from_hours(1),
        );
        let past = Clock::now_since_epoch() - Duration::from_hours(2);
        claims.issued_at = Some(past);
        claims.invalid_before = Some(past);
        claims.expires_at = Some(past + Duration::from_mins(1));
        let issued = service.sign(claims).unwrap();

        assert_eq!(service.verify_token(&issued.value), Err(TokenError::Expired));
    }

    #[test]
    fn test_wire_claims_use_original_names() {
        let service = TokenService::new(KEY, 24);
        let issued = service.create_token_for(9, "bob", 1).unwrap();

        let payload = issued.value.split('.').nth(1).unwrap();
        use base64::Engine;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["userID"], 9);
        assert_eq!(json["userName"], "bob");
        assert!(json["exp"].is_number());
    }
}
