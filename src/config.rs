use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Application settings assembled from defaults, an optional config file
/// and `TOURDESK__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    #[serde(default)]
    pub permissions: PermissionSettings,
    pub flight_status: FlightStatusSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Comma separated list of allowed origins, `*` for any.
    pub cors_origins: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub backend: StorageBackend,
    /// Business data store
    pub url: Option<String>,
    /// Audit log store; falls back to `url` when unset
    pub audit_url: Option<String>,
    /// Privileged connection used only for running migrations
    pub admin_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: Option<String>,
    pub token_ttl_seconds: i64,
    pub issuer: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapSettings {
    pub admin_name: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionSettings {
    /// Overrides the built-in role matrix
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightStatusSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    pub timeout_seconds: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8001)?
            .set_default("server.cors_origins", "*")?
            .set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("database.backend", "postgres")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.token_ttl_seconds", 86400)?
            .set_default("auth.issuer", "tourdesk")?
            .set_default("flight_status.base_url", "https://flight-status.example.com/v1")?
            .set_default("flight_status.cache_ttl_seconds", 900)?
            .set_default("flight_status.cache_max_entries", 512)?
            .set_default("flight_status.timeout_seconds", 10)?
            .add_source(File::with_name("config/tourdesk").required(false))
            .add_source(
                Environment::with_prefix("TOURDESK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }
}

impl ServerSettings {
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
