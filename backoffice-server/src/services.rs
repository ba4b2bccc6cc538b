//! Business operations behind the HTTP API

pub mod auth;
pub mod user;

pub use auth::{AuthService, LoginResponse};
pub use user::UserService;

use crate::database::{DatabaseError, DatabaseManager, UserStore};
use backoffice_core::{AuthError, BackofficeError};

/// Errors surfaced by the services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] BackofficeError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AuthError> for ServiceError {
    fn from(error: AuthError) -> Self {
        ServiceError::Core(error.into())
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Store for the primary database, in whichever mode its driver runs
fn primary_store(db: &DatabaseManager) -> ServiceResult<UserStore> {
    let driver = db.primary()?;
    Ok(UserStore::for_driver(driver.as_ref())?)
}

/// Health of the primary database
async fn primary_health(db: &DatabaseManager) -> ServiceResult<()> {
    let driver = db.primary()?;
    Ok(driver.health().await?)
}
