//! Server configuration read from the environment

use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a valid port number, got '{value}'")]
    InvalidPort { name: &'static str, value: String },

    #[error("Unknown STORAGE_TYPE '{0}', expected 'memory' or 'couchbase'")]
    UnknownStorage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Couchbase,
}

/// Couchbase connection settings, used when `STORAGE_TYPE=couchbase`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchbaseSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub couchbase: CouchbaseSettings,
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `STORAGE_TYPE` and the `COUCHBASE_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let port_value = get("PORT", "8080");
        let port = port_value.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
            name: "PORT",
            value: port_value.clone(),
        })?;

        let storage = match get("STORAGE_TYPE", "memory").as_str() {
            "memory" => StorageKind::Memory,
            "couchbase" => StorageKind::Couchbase,
            other => return Err(ConfigError::UnknownStorage(other.to_string())),
        };

        Ok(Self {
            host: get("HOST", "127.0.0.1"),
            port,
            storage,
            couchbase: CouchbaseSettings {
                url: get("COUCHBASE_URL", "couchbase://localhost"),
                username: get("COUCHBASE_USERNAME", "admin"),
                password: get("COUCHBASE_PASSWORD", "password123"),
                bucket: get("COUCHBASE_BUCKET", "species-filter"),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(feature = "couchbase")]
impl From<CouchbaseSettings> for species_filter_storage::CouchbaseConfig {
    fn from(settings: CouchbaseSettings) -> Self {
        Self {
            connection_string: settings.url,
            username: settings.username,
            password: settings.password,
            bucket_name: settings.bucket,
        }
    }
}
