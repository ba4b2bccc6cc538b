use backoffice_core::{LogContext, init_logging};
use backoffice_server::{AppConfig, Application};
use tracing::{Instrument, error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };

    let context = LogContext::new("server_startup", "backoffice-server");
    context.span().in_scope(|| {
        info!(
            version = %config.app.version,
            channel = %config.logging.channel,
            driver = %config.database.driver,
            "Starting {}",
            config.app.name
        )
    });

    let app = match Application::new(config).instrument(context.span()).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            drop(guard);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("Server error: {:#}", e);
        drop(guard);
        std::process::exit(1);
    }
}
