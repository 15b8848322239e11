// src/config.rs

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use strum::EnumString;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CLIENT_IDLE_MINUTES: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    Memory,
    Postgres,
}

#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: BackendKind,
    pub database_url: Option<String>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub admin_emails: Vec<String>,
    pub client_idle: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr_raw = non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                value: bind_addr_raw.clone(),
                reason: e.to_string(),
            })?;

        let backend = match non_empty("GATEWAY_BACKEND") {
            Some(raw) => raw
                .parse::<BackendKind>()
                .map_err(|_| ConfigError::Invalid {
                    var: "GATEWAY_BACKEND",
                    value: raw.clone(),
                    reason: "expected 'memory' or 'postgres'".to_string(),
                })?,
            None => BackendKind::Memory,
        };

        let database_url = non_empty("DATABASE_URL");
        if backend == BackendKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        // All three or nothing.
        let cloudinary = match (
            non_empty("CLOUDINARY_CLOUD_NAME"),
            non_empty("CLOUDINARY_API_KEY"),
            non_empty("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            (None, None, None) => None,
            (None, _, _) => return Err(ConfigError::Missing("CLOUDINARY_CLOUD_NAME")),
            (_, None, _) => return Err(ConfigError::Missing("CLOUDINARY_API_KEY")),
            (_, _, None) => return Err(ConfigError::Missing("CLOUDINARY_API_SECRET")),
        };

        let admin_emails = non_empty("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let client_idle_minutes = match non_empty("CLIENT_IDLE_MINUTES") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "CLIENT_IDLE_MINUTES",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_CLIENT_IDLE_MINUTES,
        };

        Ok(Self {
            bind_addr,
            backend,
            database_url,
            cloudinary,
            admin_emails,
            client_idle: Duration::from_secs(client_idle_minutes * 60),
        })
    }
}
