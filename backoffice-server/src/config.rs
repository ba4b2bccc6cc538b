//! Application configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`CONFIG_FILE`, or `config.toml` when present), then environment
//! variables. Secondary databases can only be declared in the file under
//! `[databases.<name>]`.

use crate::database::DatabaseConnectionConfig;
use backoffice_core::{BackofficeError, LogConfig, Result, parse_log_level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File read when `CONFIG_FILE` is not set
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// The primary database
    pub database: DatabaseConnectionConfig,
    /// Named secondary databases
    pub databases: BTreeMap<String, DatabaseConnectionConfig>,
    pub jwt: JwtConfig,
    pub app: AppInfo,
    pub logging: LogConfig,
}

/// Runtime mode of the HTTP server.
///
/// Debug mode adds a tracing span with request and response events per
/// request on top of the one-line request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Debug,
    Release,
    Test,
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Debug => write!(f, "debug"),
            ServerMode::Release => write!(f, "release"),
            ServerMode::Test => write!(f, "test"),
        }
    }
}

impl FromStr for ServerMode {
    type Err = BackofficeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(ServerMode::Debug),
            "release" => Ok(ServerMode::Release),
            "test" => Ok(ServerMode::Test),
            _ => Err(BackofficeError::config(format!(
                "Invalid server mode: {}. Valid modes are: debug, release, test",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: ServerMode,
    /// Limit for receiving a request body
    #[serde(with = "duration")]
    pub read_timeout: Duration,
    /// Limit for producing a response
    #[serde(with = "duration")]
    pub write_timeout: Duration,
    /// Grace period for in-flight requests on shutdown
    #[serde(with = "duration")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: ServerMode::Debug,
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(with = "duration")]
    pub expiration: Duration,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "your-secret-key-change-in-production".to_string(),
            expiration: Duration::from_secs(24 * 60 * 60),
            issuer: "backoffice-service".to_string(),
        }
    }
}

/// Service identity reported by the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub debug: bool,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "Backoffice Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            debug: true,
        }
    }
}

impl AppConfig {
    /// Load from `CONFIG_FILE` (or `config.toml`) and the process environment
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("CONFIG_FILE").ok().map(PathBuf::from);
        Self::from_sources(explicit.as_deref(), |name| std::env::var(name).ok())
    }

    /// Load from an optional file and an environment lookup.
    ///
    /// An explicit file must exist; without one, `config.toml` is read only
    /// when present.
    pub fn from_sources<F>(file: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(&EnvOverrides { lookup: env })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BackofficeError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| BackofficeError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BackofficeError::config(e.to_string()))
    }

    fn apply_env<F>(&mut self, env: &EnvOverrides<F>) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = &mut self.server;
        env.string("SERVER_HOST", &mut server.host);
        env.parse("SERVER_PORT", &mut server.port)?;
        env.parse("SERVER_MODE", &mut server.mode)?;
        env.duration("SERVER_READ_TIMEOUT", &mut server.read_timeout)?;
        env.duration("SERVER_WRITE_TIMEOUT", &mut server.write_timeout)?;
        env.duration("SERVER_SHUTDOWN_TIMEOUT", &mut server.shutdown_timeout)?;

        let db = &mut self.database;
        env.string("DB_DRIVER", &mut db.driver);
        env.string("DB_HOST", &mut db.host);
        env.parse("DB_PORT", &mut db.port)?;
        env.string("DB_USER", &mut db.user);
        env.string("DB_PASSWORD", &mut db.password);
        env.string("DB_NAME", &mut db.database);
        env.string("DB_SSLMODE", &mut db.ssl_mode);
        env.string("DB_CHARSET", &mut db.charset);
        env.parse("DB_MAX_OPEN_CONNS", &mut db.max_open_conns)?;
        env.parse("DB_MAX_IDLE_CONNS", &mut db.max_idle_conns)?;
        env.duration("DB_CONN_MAX_LIFETIME", &mut db.conn_max_lifetime)?;
        env.duration("DB_CONN_MAX_IDLE_TIME", &mut db.conn_max_idle_time)?;
        env.duration("DB_CONNECT_TIMEOUT", &mut db.connect_timeout)?;
        env.flag("DB_USE_ORM", &mut db.use_orm)?;
        env.flag("DB_RUN_MIGRATIONS", &mut db.run_migrations)?;

        let jwt = &mut self.jwt;
        env.string("JWT_SECRET", &mut jwt.secret);
        env.duration("JWT_EXPIRATION", &mut jwt.expiration)?;
        env.string("JWT_ISSUER", &mut jwt.issuer);

        let app = &mut self.app;
        env.string("APP_NAME", &mut app.name);
        env.string("APP_VERSION", &mut app.version);
        env.string("APP_ENV", &mut app.environment);
        env.flag("APP_DEBUG", &mut app.debug)?;

        let logging = &mut self.logging;
        env.parse("LOG_CHANNEL", &mut logging.channel)?;
        env.string("LOG_LEVEL", &mut logging.level);
        env.parse("LOG_FORMAT", &mut logging.format)?;
        env.parse("LOG_FILE_PATH", &mut logging.file.directory)?;
        env.string("LOG_FILE_NAME", &mut logging.file.file_name);
        env.parse("LOG_MAX_SIZE", &mut logging.file.max_size_mb)?;
        env.parse("LOG_MAX_BACKUPS", &mut logging.file.max_backups)?;
        env.parse("LOG_MAX_AGE", &mut logging.file.max_age_days)?;
        env.flag("LOG_COMPRESS", &mut logging.file.compress)?;
        env.flag("LOG_DAILY_ROTATE", &mut logging.file.daily)?;

        Ok(())
    }

    /// Reject values that would only fail later at startup
    pub fn validate(&self) -> Result<()> {
        if self.jwt.secret.is_empty() {
            return Err(BackofficeError::config("JWT secret cannot be empty"));
        }
        if self.jwt.expiration.is_zero() {
            return Err(BackofficeError::config("JWT expiration must be positive"));
        }
        parse_log_level(&self.logging.level)
            .map_err(|e| BackofficeError::config(e.to_string()))?;
        if self.logging.file.file_name.is_empty() {
            return Err(BackofficeError::config("Log file name cannot be empty"));
        }
        Ok(())
    }
}

/// Environment lookup applying typed overrides
struct EnvOverrides<F> {
    lookup: F,
}

impl<F> EnvOverrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str, target: &mut String) {
        if let Some(value) = self.get(name) {
            *target = value;
        }
    }

    fn parse<T>(&self, name: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(value) = self.get(name) {
            *target = value
                .trim()
                .parse()
                .map_err(|e| invalid(name, &value, e))?;
        }
        Ok(())
    }

    fn duration(&self, name: &str, target: &mut Duration) -> Result<()> {
        if let Some(value) = self.get(name) {
            *target = duration::parse_duration(&value).map_err(|e| invalid(name, &value, e))?;
        }
        Ok(())
    }

    fn flag(&self, name: &str, target: &mut bool) -> Result<()> {
        if let Some(value) = self.get(name) {
            *target = parse_bool(&value).ok_or_else(|| invalid(name, &value, "expected a boolean"))?;
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &str, reason: impl fmt::Display) -> BackofficeError {
    BackofficeError::config(format!("Invalid value for {}: {:?} ({})", name, value, reason))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Serde helpers for durations written as `"500ms"`, `"15s"`, `"5m"`, `"24h"`
/// or a bare number of seconds.
pub mod duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", value.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", value.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }

    /// Parse a single-unit duration; bare numbers are seconds
    pub fn parse_duration(value: &str) -> Result<Duration, String> {
        let value = value.trim();
        let split = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        let (digits, unit) = value.split_at(split);

        let amount: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration: {:?}", value))?;

        let millis_per_unit = match unit.trim() {
            "ms" => 1,
            "" | "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            other => return Err(format!("unknown duration unit {:?} in {:?}", other, value)),
        };

        amount
            .checked_mul(millis_per_unit)
            .map(Duration::from_millis)
            .ok_or_else(|| format!("duration out of range: {:?}", value))
    }
}
