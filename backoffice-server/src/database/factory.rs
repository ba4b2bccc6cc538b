//! Maps driver tags to concrete drivers

use crate::database::{
    config::{DriverConfig, DriverType},
    driver::Driver,
    error::DatabaseError,
    mysql::MySqlDriver,
    postgres::PostgresDriver,
};

/// Builds unconnected drivers. Never touches the network.
pub struct DriverFactory;

impl DriverFactory {
    /// Create a driver for `driver_type` from its typed configuration
    pub fn create_driver(
        driver_type: DriverType,
        config: DriverConfig,
    ) -> Result<Box<dyn Driver>, DatabaseError> {
        match (driver_type, config) {
            (DriverType::Postgres, DriverConfig::Postgres(config)) => {
                Ok(Box::new(PostgresDriver::new(config)))
            }
            (DriverType::Postgres, _) => {
                Err(DatabaseError::invalid_config("invalid postgres config type"))
            }
            (DriverType::MySql, DriverConfig::MySql(config)) => {
                Ok(Box::new(MySqlDriver::new(config)))
            }
            (DriverType::MySql, _) => Err(DatabaseError::invalid_config("invalid mysql config type")),
            (DriverType::MongoDb | DriverType::Sqlite, _) => Err(DatabaseError::NotImplemented {
                driver: driver_type.to_string(),
            }),
        }
    }

    /// Create a driver from a textual tag such as `postgresql` or `mysql`
    pub fn create_driver_by_name(
        driver: &str,
        config: DriverConfig,
    ) -> Result<Box<dyn Driver>, DatabaseError> {
        Self::create_driver(driver.parse()?, config)
    }
}
