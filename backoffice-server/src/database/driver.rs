//! Uniform lifecycle contract over the supported database engines

use crate::database::{
    config::DriverType,
    connection::{AccessMode, DatabaseHandle, DatabasePool},
    error::DatabaseError,
};
use async_trait::async_trait;

/// A database driver owning one native pool and, in ORM mode, an ORM handle
/// layered over that same pool.
///
/// Drivers are created unconnected by the factory. `connect` either fully
/// succeeds or leaves the driver unconnected.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open the pool and ping it once
    async fn connect(&self) -> Result<(), DatabaseError>;

    /// Release the pool; a no-op when not connected
    async fn close(&self) -> Result<(), DatabaseError>;

    /// Run `SELECT 1`, failing with `NotConnected` before `connect`
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn health(&self) -> Result<(), DatabaseError>;

    /// The ORM handle in ORM mode, the native pool otherwise
    fn handle(&self) -> Result<DatabaseHandle, DatabaseError>;

    /// The native pool, once connected
    fn sql_pool(&self) -> Option<DatabasePool>;

    /// The ORM handle, once connected in ORM mode
    fn orm(&self) -> Option<sea_orm::DatabaseConnection>;

    fn driver_type(&self) -> DriverType;

    fn access_mode(&self) -> AccessMode;

    fn is_connected(&self) -> bool;
}
