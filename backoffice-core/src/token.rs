//! HMAC-signed access tokens.
//!
//! The signing secret, issuer and lifetime are owned by a [`TokenService`]
//! instance; nothing here is process-global.

use crate::{AuthError, BackofficeError, Result};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Claims carried by every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier
    pub user_id: String,
    /// User email
    pub email: String,
    /// User role
    pub role: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

/// Issues and validates HS256 tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiration: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service for the given secret, issuer and token lifetime
    pub fn new(secret: &str, issuer: impl Into<String>, expiration: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            expiration,
        }
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: &str, email: &str, role: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(self.expiration.as_secs())
            .map_err(|_| BackofficeError::config("token expiration is too large"))?;

        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: now + lifetime,
            iat: now,
            iss: self.issuer.clone(),
        };

        self.sign(&claims)
    }

    /// Decode a token, checking signature, expiry and issuer
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::invalid_token(e.to_string()),
            }
        })?;

        Ok(data.claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| BackofficeError::internal(format!("Failed to sign token: {}", e)))
    }
}
