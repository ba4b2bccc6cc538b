use thiserror::Error;

/// Main result type for Backoffice operations
pub type Result<T> = std::result::Result<T, BackofficeError>;

/// Main error type for Backoffice operations
#[derive(Debug, Error)]
pub enum BackofficeError {
    /// Authentication-related errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A requested entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation conflicts with existing state
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal errors (should not normally occur)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Authentication-related errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, inactive account or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token could not be decoded or failed validation
    #[error("Invalid token: {reason}")]
    InvalidToken { reason: String },

    /// Token signature was valid but it is past its expiry
    #[error("Token expired")]
    TokenExpired,
}

/// Convenience methods for creating specific errors
impl BackofficeError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl AuthError {
    /// Create an invalid token error
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for BackofficeError {
    fn from(error: serde_json::Error) -> Self {
        BackofficeError::Internal {
            message: format!("Serialization error: {}", error),
        }
    }
}
