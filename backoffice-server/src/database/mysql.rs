//! MySQL driver

use crate::database::{
    config::{DriverType, MySqlConfig},
    connection::{AccessMode, ConnectionSlot, DatabaseHandle, DatabasePool},
    driver::Driver,
    error::DatabaseError,
};
use async_trait::async_trait;
use sea_orm::SqlxMySqlConnector;
use sqlx::MySql;
use sqlx::mysql::MySqlConnectOptions;
use tracing::{info, warn};

const DEFAULT_CHARSET: &str = "utf8mb4";

pub struct MySqlDriver {
    config: MySqlConfig,
    mode: AccessMode,
    slot: ConnectionSlot,
}

impl MySqlDriver {
    /// Create an unconnected driver
    pub fn new(config: MySqlConfig) -> Self {
        Self {
            mode: AccessMode::from_use_orm(config.use_orm),
            config,
            slot: ConnectionSlot::default(),
        }
    }

    fn charset(&self) -> &str {
        if self.config.charset.is_empty() {
            DEFAULT_CHARSET
        } else {
            &self.config.charset
        }
    }

    /// Connection URL with the password masked, for logs
    pub fn connection_string(&self) -> String {
        let credentials = if self.config.password.is_empty() {
            self.config.user.clone()
        } else {
            format!("{}:****", self.config.user)
        };
        format!(
            "mysql://{}@{}:{}/{}?charset={}",
            credentials,
            self.config.host,
            self.config.port,
            self.config.database,
            self.charset()
        )
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .charset(self.charset())
    }
}

impl std::fmt::Debug for MySqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlDriver")
            .field("connection", &self.connection_string())
            .field("mode", &self.mode)
            .field("connected", &self.slot.is_connected())
            .finish()
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    async fn connect(&self) -> Result<(), DatabaseError> {
        let _guard = self.slot.lock_lifecycle().await;
        if self.slot.is_connected() {
            return Ok(());
        }

        let pool = self
            .config
            .pool
            .pool_options::<MySql>(self.config.connect_timeout)
            .connect_with(self.connect_options())
            .await
            .map_err(|e| DatabaseError::connection(format!("failed to connect to mysql: {}", e)))?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(DatabaseError::connection(format!(
                "failed to ping mysql: {}",
                e
            )));
        }

        let orm = match self.mode {
            AccessMode::Orm => Some(SqlxMySqlConnector::from_sqlx_mysql_pool(pool.clone())),
            AccessMode::RawSql => None,
        };
        self.slot.store(DatabasePool::MySql(pool), orm);

        info!(
            connection = %self.connection_string(),
            mode = ?self.mode,
            "MySQL connection established"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        self.slot.close().await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.slot.ping().await.inspect_err(|e| {
            warn!(connection = %self.connection_string(), "MySQL ping failed: {}", e)
        })
    }

    async fn health(&self) -> Result<(), DatabaseError> {
        self.ping().await
    }

    fn handle(&self) -> Result<DatabaseHandle, DatabaseError> {
        self.slot.handle(self.mode)
    }

    fn sql_pool(&self) -> Option<DatabasePool> {
        self.slot.pool()
    }

    fn orm(&self) -> Option<sea_orm::DatabaseConnection> {
        self.slot.orm()
    }

    fn driver_type(&self) -> DriverType {
        DriverType::MySql
    }

    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }
}
