use anyhow::Context;
use serde::Deserialize;

use crate::books_repository::PostgresBooksRepositoryConfig;

/// Service configuration. Every field can be overridden by an upper case environment variable
/// of the same name, e.g. `DB_HOST` or `USE_IN_MEMORY_DB`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub use_in_memory_db: bool,
    #[serde(default = "Settings::default_db_host")]
    pub db_host: String,
    #[serde(default = "Settings::default_db_credential")]
    pub db_username: String,
    #[serde(default = "Settings::default_db_credential")]
    pub db_password: String,
    #[serde(default = "Settings::default_bind_address")]
    pub bind_address: String,
    #[serde(default = "Settings::default_port")]
    pub port: u16,
    /// Export spans to a local Jaeger agent
    #[serde(default = "Settings::default_jaeger_enabled")]
    pub jaeger_enabled: bool,
}

impl Settings {
    fn default_db_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_db_credential() -> String {
        "postgres".to_string()
    }

    fn default_bind_address() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_jaeger_enabled() -> bool {
        true
    }

    /// Loads settings from the process environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to build configuration")?;
        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn postgres_config(&self) -> PostgresBooksRepositoryConfig {
        PostgresBooksRepositoryConfig {
            hostname: self.db_host.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }
}
