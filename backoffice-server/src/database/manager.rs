//! Database manager and coordination layer

use crate::database::{
    config::DatabaseConnectionConfig, driver::Driver, error::DatabaseError,
    factory::DriverFactory,
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Name of the database every service uses
pub const PRIMARY: &str = "primary";

/// Name-keyed collection of drivers.
///
/// Registration and lookup are thread-safe; batch operations work on a
/// snapshot so no lock is held across an await.
#[derive(Default)]
pub struct DatabaseManager {
    drivers: RwLock<BTreeMap<String, Arc<dyn Driver>>>,
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("drivers", &self.names())
            .finish()
    }
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver; an existing name is left untouched
    pub fn add_driver(
        &self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Result<(), DatabaseError> {
        let name = name.into();
        let mut drivers = self.drivers.write().unwrap_or_else(PoisonError::into_inner);
        if drivers.contains_key(&name) {
            return Err(DatabaseError::DuplicateDriver { name });
        }
        info!(name = %name, driver = %driver.driver_type(), "Database driver registered");
        drivers.insert(name, driver);
        Ok(())
    }

    /// Build an unconnected driver from configuration and register it
    pub fn add_from_config(
        &self,
        name: impl Into<String>,
        config: &DatabaseConnectionConfig,
    ) -> Result<Arc<dyn Driver>, DatabaseError> {
        let (driver_type, driver_config) = config.to_driver_config()?;
        let driver: Arc<dyn Driver> =
            Arc::from(DriverFactory::create_driver(driver_type, driver_config)?);
        self.add_driver(name, Arc::clone(&driver))?;
        Ok(driver)
    }

    pub fn get_driver(&self, name: &str) -> Result<Arc<dyn Driver>, DatabaseError> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DatabaseError::DriverNotFound {
                name: name.to_string(),
            })
    }

    /// The primary driver
    pub fn primary(&self) -> Result<Arc<dyn Driver>, DatabaseError> {
        self.get_driver(PRIMARY)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Driver>)> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, driver)| (name.clone(), Arc::clone(driver)))
            .collect()
    }

    /// Connect every driver, reporting all failures together
    pub async fn connect_all(&self) -> Result<(), DatabaseError> {
        let mut failures = Vec::new();
        for (name, driver) in self.snapshot() {
            if let Err(e) = driver.connect().await {
                warn!(name = %name, "Failed to connect database: {}", e);
                failures.push((name, e));
            }
        }
        DatabaseError::aggregate(failures)
    }

    /// Close every driver, reporting all failures together
    pub async fn close_all(&self) -> Result<(), DatabaseError> {
        let mut failures = Vec::new();
        for (name, driver) in self.snapshot() {
            if let Err(e) = driver.close().await {
                warn!(name = %name, "Failed to close database: {}", e);
                failures.push((name, e));
            }
        }
        DatabaseError::aggregate(failures)
    }

    /// Health of every driver, keyed by name
    pub async fn health(&self) -> BTreeMap<String, Result<(), DatabaseError>> {
        let mut report = BTreeMap::new();
        for (name, driver) in self.snapshot() {
            let result = driver.health().await;
            report.insert(name, result);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::config::DriverType;
    use crate::database::driver::MockDriver;

    fn mock(driver_type: DriverType) -> MockDriver {
        let mut driver = MockDriver::new();
        driver.expect_driver_type().return_const(driver_type);
        driver
    }

    #[test]
    fn test_add_and_get_driver() {
        let manager = DatabaseManager::new();
        manager
            .add_driver(PRIMARY, Arc::new(mock(DriverType::Postgres)))
            .unwrap();

        let driver = manager.primary().unwrap();
        assert_eq!(driver.driver_type(), DriverType::Postgres);
        assert!(matches!(
            manager.get_driver("reports"),
            Err(DatabaseError::DriverNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_keeps_original() {
        let manager = DatabaseManager::new();
        manager
            .add_driver(PRIMARY, Arc::new(mock(DriverType::Postgres)))
            .unwrap();

        let err = manager
            .add_driver(PRIMARY, Arc::new(mock(DriverType::MySql)))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateDriver { .. }));
        assert_eq!(
            manager.primary().unwrap().driver_type(),
            DriverType::Postgres
        );
    }

    #[test]
    fn test_names_are_sorted() {
        let manager = DatabaseManager::new();
        for name in ["reports", "primary", "archive"] {
            manager
                .add_driver(name, Arc::new(mock(DriverType::Postgres)))
                .unwrap();
        }
        assert_eq!(manager.names(), vec!["archive", "primary", "reports"]);
    }

    #[test]
    fn test_add_from_config_builds_unconnected_driver() {
        let manager = DatabaseManager::new();
        let driver = manager
            .add_from_config(PRIMARY, &DatabaseConnectionConfig::default())
            .unwrap();

        assert!(!driver.is_connected());
        assert!(manager.get_driver(PRIMARY).is_ok());

        let sqlite = DatabaseConnectionConfig {
            driver: "sqlite".to_string(),
            ..DatabaseConnectionConfig::default()
        };
        assert!(manager.add_from_config("cache", &sqlite).is_err());
        assert_eq!(manager.names(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_connect_all_attempts_every_driver() {
        let manager = DatabaseManager::new();

        let mut failing = mock(DriverType::MySql);
        failing
            .expect_connect()
            .times(1)
            .returning(|| Err(DatabaseError::connection("refused")));
        let mut healthy = mock(DriverType::Postgres);
        healthy.expect_connect().times(1).returning(|| Ok(()));

        manager.add_driver("analytics", Arc::new(failing)).unwrap();
        manager.add_driver(PRIMARY, Arc::new(healthy)).unwrap();

        match manager.connect_all().await {
            Err(DatabaseError::Aggregate { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "analytics");
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_all_visits_every_driver() {
        let manager = DatabaseManager::new();
        for (name, fails) in [("a", true), ("b", false), ("c", true)] {
            let mut driver = mock(DriverType::Postgres);
            driver.expect_close().times(1).returning(move || {
                if fails {
                    Err(DatabaseError::query("close failed"))
                } else {
                    Ok(())
                }
            });
            manager.add_driver(name, Arc::new(driver)).unwrap();
        }

        match manager.close_all().await {
            Err(DatabaseError::Aggregate { failures }) => {
                let names: Vec<_> = failures.iter().map(|(name, _)| name.as_str()).collect();
                assert_eq!(names, vec!["a", "c"]);
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_reports_every_driver() {
        let manager = DatabaseManager::new();

        let mut up = mock(DriverType::Postgres);
        up.expect_health().returning(|| Ok(()));
        let mut down = mock(DriverType::MySql);
        down.expect_health()
            .returning(|| Err(DatabaseError::NotConnected));

        manager.add_driver(PRIMARY, Arc::new(up)).unwrap();
        manager.add_driver("reports", Arc::new(down)).unwrap();

        let report = manager.health().await;
        assert_eq!(report.len(), 2);
        assert!(report[PRIMARY].is_ok());
        assert!(matches!(report["reports"], Err(DatabaseError::NotConnected)));
    }

    #[tokio::test]
    async fn test_empty_manager_batch_operations() {
        let manager = DatabaseManager::new();
        assert!(manager.connect_all().await.is_ok());
        assert!(manager.close_all().await.is_ok());
        assert!(manager.health().await.is_empty());
    }
}
