//! User account management

use super::{ServiceError, ServiceResult, primary_health, primary_store};
use crate::database::{DatabaseError, DatabaseManager};
use crate::models::{CreateUserRequest, UpdateUserRequest, User};
use backoffice_core::{BackofficeError, hash_password};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserService {
    db: Arc<DatabaseManager>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, id: &str) -> ServiceResult<User> {
        let id = parse_id(id)?;
        let store = primary_store(&self.db)?;
        store
            .find_by_id(id)
            .await?
            .map(User::without_password)
            .ok_or_else(|| BackofficeError::not_found("user", id.to_string()).into())
    }

    pub async fn get_user_by_email(&self, email: &str) -> ServiceResult<User> {
        let store = primary_store(&self.db)?;
        store
            .find_by_email(email)
            .await?
            .map(User::without_password)
            .ok_or_else(|| BackofficeError::not_found("user", email).into())
    }

    /// Create a user; without a password the account cannot log in
    pub async fn create_user(&self, request: CreateUserRequest) -> ServiceResult<User> {
        let mut user = User::new(
            request.email,
            request.username,
            request.first_name,
            request.last_name,
            request.role.unwrap_or_default(),
        );
        if let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) {
            user = user.with_password_hash(hash_password(password)?);
        }

        let store = primary_store(&self.db)?;
        store.insert(&user).await.map_err(duplicate_email)?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user.without_password())
    }

    pub async fn update_user(&self, id: &str, request: UpdateUserRequest) -> ServiceResult<User> {
        let id = parse_id(id)?;
        let store = primary_store(&self.db)?;

        let mut user = store
            .find_by_id(id)
            .await?
            .ok_or_else(|| BackofficeError::not_found("user", id.to_string()))?;

        request.apply_to(&mut user);
        if let Some(password) = request.new_password() {
            user.password = hash_password(password)?;
        }
        user.touch();

        store.update(&user).await.map_err(duplicate_email)?;

        info!(user_id = %user.id, "User updated");
        Ok(user.without_password())
    }

    pub async fn delete_user(&self, id: &str) -> ServiceResult<()> {
        let id = parse_id(id)?;
        let store = primary_store(&self.db)?;
        store.delete(id).await.map_err(|e| -> ServiceError {
            match e {
                DatabaseError::NotFound { .. } => {
                    BackofficeError::not_found("user", id.to_string()).into()
                }
                other => other.into(),
            }
        })?;

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Newest first
    pub async fn list_users(&self, limit: u64, offset: u64) -> ServiceResult<Vec<User>> {
        let store = primary_store(&self.db)?;
        let users = store.list(limit, offset).await?;
        Ok(users.into_iter().map(User::without_password).collect())
    }

    pub async fn health(&self) -> ServiceResult<()> {
        primary_health(&self.db).await
    }
}

fn parse_id(id: &str) -> Result<Uuid, BackofficeError> {
    Uuid::parse_str(id).map_err(|_| BackofficeError::validation(format!("Invalid user id: {}", id)))
}

fn duplicate_email(error: DatabaseError) -> ServiceError {
    match error {
        DatabaseError::Duplicate { .. } => {
            BackofficeError::conflict("A user with this email already exists").into()
        }
        other => other.into(),
    }
}
