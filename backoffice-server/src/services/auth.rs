//! Authentication: login, registration and token lifecycle

use super::{ServiceError, ServiceResult, primary_health, primary_store};
use crate::database::{DatabaseError, DatabaseManager};
use crate::models::{RegisterRequest, User, UserRole};
use backoffice_core::{AuthError, BackofficeError, Claims, TokenService, hash_password, verify_password};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Successful login payload
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    db: Arc<DatabaseManager>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseManager>, tokens: TokenService) -> Self {
        Self { db, tokens }
    }

    /// Check credentials against an active account and issue a token.
    ///
    /// Unknown email, inactive account and wrong password are indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResponse> {
        let store = primary_store(&self.db)?;

        let Some(user) = store.find_active_by_email(email).await? else {
            warn!("Login rejected: no active account");
            return Err(AuthError::InvalidCredentials.into());
        };

        // an empty hash belongs to an account created without a password
        if user.password.is_empty() || !verify_password(password, &user.password)? {
            warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.issue(&user)?;
        info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            token,
            user: user.without_password(),
        })
    }

    /// Create an active account with the `user` role
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<User> {
        let hash = hash_password(&request.password)?;
        let user = User::new(
            request.email,
            request.username,
            request.first_name,
            request.last_name,
            UserRole::User,
        )
        .with_password_hash(hash);

        let store = primary_store(&self.db)?;
        store.insert(&user).await.map_err(|e| -> ServiceError {
            match e {
                DatabaseError::Duplicate { .. } => {
                    BackofficeError::conflict("A user with this email already exists").into()
                }
                other => other.into(),
            }
        })?;

        info!(user_id = %user.id, "User registered");
        Ok(user.without_password())
    }

    /// Issue a fresh token for the subject of a valid one
    pub async fn refresh_token(&self, token: &str) -> ServiceResult<String> {
        let claims = self
            .tokens
            .verify(token)
            .inspect_err(|e| warn!("Refresh rejected: {}", e))?;

        let token = self
            .tokens
            .issue(&claims.user_id, &claims.email, &claims.role)?;
        info!(user_id = %claims.user_id, "Token refreshed");
        Ok(token)
    }

    /// Tokens are stateless, so logout only records the event
    pub async fn logout(&self, token: Option<&str>) -> ServiceResult<()> {
        match token.map(|t| self.tokens.verify(t)) {
            Some(Ok(claims)) => info!(user_id = %claims.user_id, "User logged out"),
            Some(Err(e)) => info!("Logout with unusable token: {}", e),
            None => info!("Logout without token"),
        }
        Ok(())
    }

    /// Decode and validate a token
    pub fn validate_token(&self, token: &str) -> ServiceResult<Claims> {
        Ok(self.tokens.verify(token)?)
    }

    pub async fn health(&self) -> ServiceResult<()> {
        primary_health(&self.db).await
    }

    fn issue(&self, user: &User) -> ServiceResult<String> {
        Ok(self
            .tokens
            .issue(&user.id.to_string(), &user.email, user.role.as_str())?)
    }
}
