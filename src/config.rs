use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

use crate::currency::Currency;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub mongo: MongoConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongo,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MongoConfig {
    pub uri: Option<String>,
    pub database: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// Unset means every request is accepted.
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DefaultsConfig {
    pub currency: Currency,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = Self::defaults()?;

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("WARIKAN")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        // Conventional variable names used by the deployment scripts.
        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(uri) = env::var("MONGODB_URI") {
            builder = builder
                .set_override("mongo.uri", uri)?
                .set_override("storage.backend", "mongo")?;
        }

        if let Ok(api_key) = env::var("API_KEY") {
            builder = builder.set_override("auth.api_key", api_key)?;
        }

        if let Ok(origins) = env::var("FRONTEND_URLS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            builder = builder.set_override("cors.allowed_origins", origins)?;
        }

        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("storage.backend", "memory")?
            .set_default("mongo.database", "warikan")?
            .set_default(
                "cors.allowed_origins",
                vec!["http://localhost:5173", "http://localhost:3000"],
            )?
            .set_default("defaults.currency", "JPY")
    }

    /// Configuration built from defaults only, ignoring the environment.
    pub fn default_only() -> Result<Self, ConfigError> {
        Self::defaults()?.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.server.workers == 0 {
            return Err("Server workers must be at least 1".to_string());
        }

        if self.storage.backend == StorageBackend::Mongo
            && self.mongo.uri.as_deref().map_or(true, str::is_empty)
        {
            return Err("MongoDB storage requires mongo.uri".to_string());
        }

        if self.mongo.database.is_empty() {
            return Err("MongoDB database name cannot be empty".to_string());
        }

        Ok(())
    }
}
