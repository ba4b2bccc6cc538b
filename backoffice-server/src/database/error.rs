//! Database error types and conversions

use backoffice_core::BackofficeError;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Database not connected")]
    NotConnected,

    #[error("Unsupported database driver: {driver}")]
    UnsupportedDriver { driver: String },

    #[error("Invalid driver configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Database driver not implemented yet: {driver}")]
    NotImplemented { driver: String },

    #[error("Database driver not found: {name}")]
    DriverNotFound { name: String },

    #[error("Database driver already registered: {name}")]
    DuplicateDriver { name: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate record: {entity} with key {key}")]
    Duplicate { entity: String, key: String },

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("{count} database operation(s) failed: {summary}", count = .failures.len(), summary = summarize(.failures))]
    Aggregate { failures: Vec<(String, DatabaseError)> },
}

fn summarize(failures: &[(String, DatabaseError)]) -> String {
    failures
        .iter()
        .map(|(name, error)| format!("{}: {}", name, error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl DatabaseError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Map a sqlx error, turning unique-key violations into `Duplicate`
    pub fn from_sqlx(error: sqlx::Error, entity: &str, key: &str) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate {
                entity: entity.to_string(),
                key: key.to_string(),
            },
            _ => Self::query(error.to_string()),
        }
    }

    /// Map a sea-orm error, turning unique-key violations into `Duplicate`
    pub fn from_orm(error: sea_orm::DbErr, entity: &str, key: &str) -> Self {
        match error.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Self::Duplicate {
                entity: entity.to_string(),
                key: key.to_string(),
            },
            _ => Self::query(error.to_string()),
        }
    }

    /// Combine failures, `Ok` when there are none
    pub fn aggregate(failures: Vec<(String, DatabaseError)>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::Aggregate { failures })
        }
    }
}

impl From<DatabaseError> for BackofficeError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => BackofficeError::not_found(entity, id),
            DatabaseError::Duplicate { entity, key } => {
                BackofficeError::conflict(format!("{} already exists: {}", entity, key))
            }
            other => BackofficeError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_empty_is_ok() {
        assert!(DatabaseError::aggregate(Vec::new()).is_ok());
    }

    #[test]
    fn test_aggregate_lists_every_failure() {
        let err = DatabaseError::aggregate(vec![
            ("primary".to_string(), DatabaseError::NotConnected),
            ("analytics".to_string(), DatabaseError::connection("refused")),
        ])
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("2 database operation(s) failed"));
        assert!(message.contains("primary: Database not connected"));
        assert!(message.contains("analytics: Connection error: refused"));
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: BackofficeError = DatabaseError::NotFound {
            entity: "user".to_string(),
            id: "42".to_string(),
        }
        .into();
        assert!(matches!(err, BackofficeError::NotFound { .. }));

        let err: BackofficeError = DatabaseError::Duplicate {
            entity: "user".to_string(),
            key: "a@x.com".to_string(),
        }
        .into();
        assert!(matches!(err, BackofficeError::Conflict { .. }));
    }
}
