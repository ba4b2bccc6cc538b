//! Application lifecycle: database setup, serving and graceful shutdown

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::database::{DatabaseConnectionConfig, DatabaseManager, Driver, DriverFactory, PRIMARY};
use anyhow::{Context, Result};
use axum::Router;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub struct Application {
    config: Arc<AppConfig>,
    db: Arc<DatabaseManager>,
}

impl Application {
    /// Connect the databases declared in `config`.
    ///
    /// The primary database must connect; a secondary that fails is logged
    /// and left out of the manager.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = Arc::new(DatabaseManager::new());

        let primary = db
            .add_from_config(PRIMARY, &config.database)
            .context("Invalid primary database configuration")?;
        primary
            .connect()
            .await
            .context("Failed to connect primary database")?;
        if config.database.run_migrations {
            migrate(primary.as_ref()).await?;
        }

        for (name, secondary) in &config.databases {
            match connect_secondary(secondary).await {
                Ok(driver) => {
                    if let Err(e) = db.add_driver(name.clone(), driver) {
                        warn!(name = %name, "Skipping secondary database: {}", e);
                    }
                }
                Err(e) => warn!(name = %name, "Skipping secondary database: {:#}", e),
            }
        }

        Ok(Self::with_manager(config, db))
    }

    /// Wrap an already populated manager
    pub fn with_manager(config: AppConfig, db: Arc<DatabaseManager>) -> Self {
        Self {
            config: Arc::new(config),
            db,
        }
    }

    pub fn database(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    pub fn router(&self) -> Router {
        api::router(AppState::new(Arc::clone(&self.config), Arc::clone(&self.db)))
    }

    /// Serve until SIGINT or SIGTERM, then drain for the shutdown grace
    /// period and close every database.
    pub async fn run(self) -> Result<()> {
        let address = self.config.server.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;
        info!(
            address = %address,
            mode = %self.config.server.mode,
            environment = %self.config.app.environment,
            "{} listening",
            self.config.app.name
        );

        let stop = Arc::new(Notify::new());
        let server = axum::serve(listener, self.router()).with_graceful_shutdown({
            let stop = Arc::clone(&stop);
            async move { stop.notified().await }
        });
        let mut server = tokio::spawn(server.into_future());

        let served = tokio::select! {
            joined = &mut server => joined.context("Server task failed")?.context("Server error"),
            _ = shutdown_signal() => {
                info!("Shutdown signal received, draining in-flight requests");
                stop.notify_one();

                let grace = self.config.server.shutdown_timeout;
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(joined) => joined.context("Server task failed")?.context("Server error"),
                    Err(_) => {
                        warn!(grace_secs = grace.as_secs(), "Grace period elapsed, dropping open connections");
                        server.abort();
                        Ok(())
                    }
                }
            }
        };

        if let Err(e) = self.db.close_all().await {
            error!("Failed to close databases: {}", e);
        }
        info!("Server stopped");
        served
    }
}

async fn connect_secondary(config: &DatabaseConnectionConfig) -> Result<Arc<dyn Driver>> {
    let (driver_type, driver_config) = config.to_driver_config()?;
    let driver: Arc<dyn Driver> = Arc::from(DriverFactory::create_driver(driver_type, driver_config)?);
    driver.connect().await?;
    Ok(driver)
}

async fn migrate(driver: &dyn Driver) -> Result<()> {
    let pool = driver
        .sql_pool()
        .context("Primary database has no pool after connecting")?;
    pool.run_migrations()
        .await
        .context("Failed to run database migrations")?;
    info!(dialect = pool.dialect(), "Database migrations applied");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
