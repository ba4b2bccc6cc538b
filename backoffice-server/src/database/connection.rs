//! Database connection pool management

use crate::database::error::DatabaseError;
use sqlx::{MySqlPool, PgPool};
use tracing::{debug, error, info};

/// How a driver's callers reach the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Entity operations through sea-orm
    Orm,
    /// Hand-written statements through sqlx
    RawSql,
}

impl AccessMode {
    pub fn from_use_orm(use_orm: bool) -> Self {
        if use_orm { Self::Orm } else { Self::RawSql }
    }
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub enum DatabasePool {
    /// PostgreSQL connection pool
    Postgres(PgPool),
    /// MySQL connection pool
    MySql(MySqlPool),
}

impl DatabasePool {
    /// Run `SELECT 1` on the pool
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let result = match self {
            DatabasePool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DatabasePool::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                debug!(dialect = self.dialect(), "Database health check passed");
                Ok(())
            }
            Err(e) => {
                error!(dialect = self.dialect(), "Database health check failed: {}", e);
                Err(DatabaseError::connection(e.to_string()))
            }
        }
    }

    /// Close every connection in the pool
    pub async fn close(&self) {
        match self {
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::MySql(pool) => pool.close().await,
        }
    }

    /// Apply the embedded migrations for this dialect
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations for {}", self.dialect());

        let result = match self {
            DatabasePool::Postgres(pool) => sqlx::migrate!("./migrations/postgres").run(pool).await,
            DatabasePool::MySql(pool) => sqlx::migrate!("./migrations/mysql").run(pool).await,
        };
        result.map_err(|e| DatabaseError::Migration {
            message: format!("{} migration failed: {}", self.dialect(), e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn dialect(&self) -> &'static str {
        match self {
            DatabasePool::Postgres(_) => "postgresql",
            DatabasePool::MySql(_) => "mysql",
        }
    }
}

/// What a connected driver hands to its callers
#[derive(Debug, Clone)]
pub enum DatabaseHandle {
    /// sea-orm connection sharing the driver's pool
    Orm(sea_orm::DatabaseConnection),
    /// The native pool itself
    Sql(DatabasePool),
}

/// Live resources of a connected driver
#[derive(Debug, Clone)]
struct Connected {
    pool: DatabasePool,
    orm: Option<sea_orm::DatabaseConnection>,
}

/// Connection state shared by the concrete drivers.
///
/// Lookups are synchronous; connect and close are serialized by `lifecycle`.
#[derive(Debug, Default)]
pub(crate) struct ConnectionSlot {
    state: std::sync::RwLock<Option<Connected>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl ConnectionSlot {
    pub(crate) async fn lock_lifecycle(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lifecycle.lock().await
    }

    fn read(&self) -> Option<Connected> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.read().is_some()
    }

    pub(crate) fn store(&self, pool: DatabasePool, orm: Option<sea_orm::DatabaseConnection>) {
        *self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Connected { pool, orm });
    }

    pub(crate) fn take(&self) -> Option<DatabasePool> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .map(|connected| connected.pool)
    }

    pub(crate) fn pool(&self) -> Option<DatabasePool> {
        self.read().map(|connected| connected.pool)
    }

    pub(crate) fn orm(&self) -> Option<sea_orm::DatabaseConnection> {
        self.read().and_then(|connected| connected.orm)
    }

    pub(crate) fn handle(&self, mode: AccessMode) -> Result<DatabaseHandle, DatabaseError> {
        let connected = self.read().ok_or(DatabaseError::NotConnected)?;
        match (mode, connected.orm) {
            (AccessMode::Orm, Some(orm)) => Ok(DatabaseHandle::Orm(orm)),
            _ => Ok(DatabaseHandle::Sql(connected.pool)),
        }
    }

    pub(crate) async fn ping(&self) -> Result<(), DatabaseError> {
        self.pool()
            .ok_or(DatabaseError::NotConnected)?
            .health_check()
            .await
    }

    pub(crate) async fn close(&self) {
        let _guard = self.lock_lifecycle().await;
        if let Some(pool) = self.take() {
            pool.close().await;
            info!(dialect = pool.dialect(), "Database connection closed");
        }
    }
}
