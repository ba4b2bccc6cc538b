//! Database configuration types and utilities

use crate::config::duration;
use crate::database::error::DatabaseError;
use serde::{Deserialize, Serialize};
use sqlx::pool::PoolOptions;
use std::time::Duration;

pub const DEFAULT_MAX_OPEN_CONNS: u32 = 25;
pub const DEFAULT_MAX_IDLE_CONNS: u32 = 5;
pub const DEFAULT_CONN_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONN_MAX_IDLE_TIME: Duration = Duration::from_secs(10 * 60);

/// Supported database driver tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverType {
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    /// Known but not implemented
    MongoDb,
    /// Known but not implemented
    Sqlite,
}

impl std::fmt::Display for DriverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverType::Postgres => write!(f, "postgresql"),
            DriverType::MySql => write!(f, "mysql"),
            DriverType::MongoDb => write!(f, "mongodb"),
            DriverType::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DriverType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DriverType::Postgres),
            "mysql" | "mariadb" => Ok(DriverType::MySql),
            "mongodb" => Ok(DriverType::MongoDb),
            "sqlite" => Ok(DriverType::Sqlite),
            _ => Err(DatabaseError::UnsupportedDriver {
                driver: s.to_string(),
            }),
        }
    }
}

/// Pool tuning shared by every driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_open_conns: u32,
    /// Warm connections kept by the pool
    pub max_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_open_conns: DEFAULT_MAX_OPEN_CONNS,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            conn_max_lifetime: DEFAULT_CONN_MAX_LIFETIME,
            conn_max_idle_time: DEFAULT_CONN_MAX_IDLE_TIME,
        }
    }
}

impl PoolSettings {
    /// Replace zero values with defaults and keep idle within the open limit
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let non_zero_u32 = |value: u32, default: u32| if value == 0 { default } else { value };
        let non_zero_duration =
            |value: Duration, default: Duration| if value.is_zero() { default } else { value };

        let max_open_conns = non_zero_u32(self.max_open_conns, defaults.max_open_conns);
        Self {
            max_open_conns,
            max_idle_conns: non_zero_u32(self.max_idle_conns, defaults.max_idle_conns)
                .min(max_open_conns),
            conn_max_lifetime: non_zero_duration(
                self.conn_max_lifetime,
                defaults.conn_max_lifetime,
            ),
            conn_max_idle_time: non_zero_duration(
                self.conn_max_idle_time,
                defaults.conn_max_idle_time,
            ),
        }
    }

    /// Apply the settings to a sqlx pool builder
    pub fn pool_options<DB: sqlx::Database>(&self, connect_timeout: Duration) -> PoolOptions<DB> {
        let settings = self.normalized();
        PoolOptions::<DB>::new()
            .max_connections(settings.max_open_conns)
            .min_connections(settings.max_idle_conns)
            .max_lifetime(settings.conn_max_lifetime)
            .idle_timeout(settings.conn_max_idle_time)
            .acquire_timeout(connect_timeout)
    }
}

/// PostgreSQL driver configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub pool: PoolSettings,
    pub connect_timeout: Duration,
    pub use_orm: bool,
}

/// MySQL driver configuration
#[derive(Debug, Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub pool: PoolSettings,
    pub connect_timeout: Duration,
    pub use_orm: bool,
}

/// Driver-specific configuration handed to the factory
#[derive(Debug, Clone)]
pub enum DriverConfig {
    Postgres(PostgresConfig),
    MySql(MySqlConfig),
}

/// One database connection as declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConnectionConfig {
    /// Driver tag: postgresql, mysql, mongodb or sqlite
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(alias = "dbname")]
    pub database: String,
    /// PostgreSQL only
    #[serde(alias = "sslmode")]
    pub ssl_mode: String,
    /// MySQL only
    pub charset: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    #[serde(with = "duration")]
    pub conn_max_lifetime: Duration,
    #[serde(with = "duration")]
    pub conn_max_idle_time: Duration,
    #[serde(with = "duration")]
    pub connect_timeout: Duration,
    pub use_orm: bool,
    /// Apply the embedded migrations after connecting
    pub run_migrations: bool,
}

impl Default for DatabaseConnectionConfig {
    fn default() -> Self {
        Self {
            driver: DriverType::Postgres.to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "backoffice".to_string(),
            ssl_mode: "disable".to_string(),
            charset: "utf8mb4".to_string(),
            max_open_conns: DEFAULT_MAX_OPEN_CONNS,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            conn_max_lifetime: DEFAULT_CONN_MAX_LIFETIME,
            conn_max_idle_time: DEFAULT_CONN_MAX_IDLE_TIME,
            connect_timeout: Duration::from_secs(10),
            use_orm: true,
            run_migrations: true,
        }
    }
}

impl DatabaseConnectionConfig {
    pub fn driver_type(&self) -> Result<DriverType, DatabaseError> {
        self.driver.parse()
    }

    fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_open_conns: self.max_open_conns,
            max_idle_conns: self.max_idle_conns,
            conn_max_lifetime: self.conn_max_lifetime,
            conn_max_idle_time: self.conn_max_idle_time,
        }
    }

    /// Convert into the typed configuration of its driver
    pub fn to_driver_config(&self) -> Result<(DriverType, DriverConfig), DatabaseError> {
        let driver_type = self.driver_type()?;
        let config = match driver_type {
            DriverType::Postgres => DriverConfig::Postgres(PostgresConfig {
                host: self.host.clone(),
                port: self.port,
                user: self.user.clone(),
                password: self.password.clone(),
                database: self.database.clone(),
                ssl_mode: self.ssl_mode.clone(),
                pool: self.pool_settings(),
                connect_timeout: self.connect_timeout,
                use_orm: self.use_orm,
            }),
            DriverType::MySql => DriverConfig::MySql(MySqlConfig {
                host: self.host.clone(),
                port: self.port,
                user: self.user.clone(),
                password: self.password.clone(),
                database: self.database.clone(),
                charset: self.charset.clone(),
                pool: self.pool_settings(),
                connect_timeout: self.connect_timeout,
                use_orm: self.use_orm,
            }),
            DriverType::MongoDb | DriverType::Sqlite => {
                return Err(DatabaseError::UnsupportedDriver {
                    driver: self.driver.clone(),
                });
            }
        };
        Ok((driver_type, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_type_parsing() {
        assert_eq!("postgresql".parse::<DriverType>().unwrap(), DriverType::Postgres);
        assert_eq!("Postgres".parse::<DriverType>().unwrap(), DriverType::Postgres);
        assert_eq!("mysql".parse::<DriverType>().unwrap(), DriverType::MySql);
        assert_eq!("sqlite".parse::<DriverType>().unwrap(), DriverType::Sqlite);
        assert!(matches!(
            "oracle".parse::<DriverType>(),
            Err(DatabaseError::UnsupportedDriver { .. })
        ));
        assert_eq!(DriverType::Postgres.to_string(), "postgresql");
    }

    #[test]
    fn test_pool_settings_defaults_replace_zero() {
        let settings = PoolSettings {
            max_open_conns: 0,
            max_idle_conns: 0,
            conn_max_lifetime: Duration::ZERO,
            conn_max_idle_time: Duration::ZERO,
        }
        .normalized();

        assert_eq!(settings, PoolSettings::default());
    }

    #[test]
    fn test_pool_settings_idle_clamped_to_open() {
        let settings = PoolSettings {
            max_open_conns: 3,
            max_idle_conns: 10,
            ..PoolSettings::default()
        }
        .normalized();

        assert_eq!(settings.max_open_conns, 3);
        assert_eq!(settings.max_idle_conns, 3);
    }

    #[test]
    fn test_to_driver_config() {
        let config = DatabaseConnectionConfig {
            driver: "mysql".to_string(),
            port: 3306,
            charset: "latin1".to_string(),
            ..DatabaseConnectionConfig::default()
        };

        let (driver_type, driver_config) = config.to_driver_config().unwrap();
        assert_eq!(driver_type, DriverType::MySql);
        match driver_config {
            DriverConfig::MySql(mysql) => {
                assert_eq!(mysql.port, 3306);
                assert_eq!(mysql.charset, "latin1");
                assert!(mysql.use_orm);
            }
            other => panic!("expected mysql config, got {:?}", other),
        }
    }

    #[test]
    fn test_to_driver_config_rejects_untyped_drivers() {
        for driver in ["sqlite", "mongodb", "oracle"] {
            let config = DatabaseConnectionConfig {
                driver: driver.to_string(),
                ..DatabaseConnectionConfig::default()
            };
            assert!(matches!(
                config.to_driver_config(),
                Err(DatabaseError::UnsupportedDriver { .. })
            ));
        }
    }

    #[test]
    fn test_deserialize_from_toml() {
        let config: DatabaseConnectionConfig = toml::from_str(
            r#"
            driver = "mysql"
            host = "db.internal"
            port = 3306
            dbname = "reports"
            conn_max_lifetime = "2m"
            connect_timeout = 3
            use_orm = false
            "#,
        )
        .unwrap();

        assert_eq!(config.driver, "mysql");
        assert_eq!(config.database, "reports");
        assert_eq!(config.conn_max_lifetime, Duration::from_secs(120));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert!(!config.use_orm);
        assert_eq!(config.max_open_conns, DEFAULT_MAX_OPEN_CONNS);
    }
}
