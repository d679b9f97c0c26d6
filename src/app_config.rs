//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Container-style variables (`MONGO_URI`, `MONGO_HOST`,
//!    `MONGO_INITDB_ROOT_USERNAME`, `MONGO_INITDB_ROOT_PASSWORD`)
//! 2. Environment variables prefixed with `FLAGPOST_`, using `__` between
//!    section and key (e.g. `FLAGPOST_MONGO__CONNECT_TIMEOUT_MS`)
//! 3. Config file (flagpost.toml)
//! 4. Default values
//!
//! Database credentials should be kept in environment variables, not in the
//! config file.

use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default config file, relative to the working directory.
pub const CONFIG_PATH: &str = "flagpost.toml";

/// Global application configuration
pub static APP_CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    })
});

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the dashboard frontend. Empty disables static serving.
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: String::new(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// Full connection string. When set, host and credentials are ignored.
    pub uri: String,
    pub host: String,
    pub port: u16,
    /// Root username (should be in env var MONGO_INITDB_ROOT_USERNAME)
    pub username: String,
    /// Root password (should be in env var MONGO_INITDB_ROOT_PASSWORD)
    pub password: String,
    pub database: String,
    pub collection: String,
    /// Upper bound for the initial connection attempt
    pub connect_timeout_ms: u64,
    /// Insert the starter flags when the collection is empty
    pub seed: bool,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            host: "localhost".to_string(),
            port: 27017,
            username: String::new(),
            password: String::new(),
            database: "feature_flags_db".to_string(),
            collection: "flags".to_string(),
            connect_timeout_ms: 5000,
            seed: true,
        }
    }
}

impl MongoConfig {
    /// Build the connection string used by the driver.
    pub fn connection_uri(&self) -> String {
        if !self.uri.is_empty() {
            return self.uri.clone();
        }

        if !self.username.is_empty() && !self.password.is_empty() {
            format!(
                "mongodb://{}:{}@{}:{}/?authSource=admin",
                self.username, self.password, self.host, self.port
            )
        } else {
            format!("mongodb://{}:{}/", self.host, self.port)
        }
    }

    /// Credential-free description of the connection target, safe for logs.
    pub fn target(&self) -> String {
        if self.uri.is_empty() {
            format!("{}:{}/{}", self.host, self.port, self.database)
        } else {
            format!("<configured uri>/{}", self.database)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Flag behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    /// Environment used when a request does not name one
    pub default_environment: String,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            default_environment: "staging".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    pub flags: FlagsConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(CONFIG_PATH)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add config file (optional)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // Override with environment variables (FLAGPOST_ prefix)
            // e.g., FLAGPOST_SERVER__PORT, FLAGPOST_FLAGS__DEFAULT_ENVIRONMENT
            .add_source(
                Environment::with_prefix("FLAGPOST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Variables shared with the database container
            .set_override_option("mongo.uri", std::env::var("MONGO_URI").ok())?
            .set_override_option("mongo.host", std::env::var("MONGO_HOST").ok())?
            .set_override_option(
                "mongo.username",
                std::env::var("MONGO_INITDB_ROOT_USERNAME").ok(),
            )?
            .set_override_option(
                "mongo.password",
                std::env::var("MONGO_INITDB_ROOT_PASSWORD").ok(),
            )?
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// This triggers the lazy loading of the config file and logs the result.
/// Should be called early in application startup.
pub fn init() {
    let config = get_config();
    log::info!(
        "Configuration loaded: listening on {}:{}, document store {}",
        config.server.host,
        config.server.port,
        config.mongo.target()
    );
}

/// Get the application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.clone()
}
