//! Process configuration read from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;
use tracing::warn;

use rentdesk_infra::services::{AdminSeed, AuthSettings};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} is required when USE_PERSISTENT_STORES is enabled")]
    Missing(&'static str),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Seeded on start when `ADMIN_PASSWORD` is set.
    pub admin: Option<AdminSeed>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("admin", &self.admin.as_ref().map(|a| &a.username))
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "BIND_ADDR",
            expected: "a socket address",
            value: bind_raw.clone(),
        })?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let ttl_minutes = match get("ACCESS_TOKEN_TTL_MINUTES") {
            None => DEFAULT_TOKEN_TTL_MINUTES,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "ACCESS_TOKEN_TTL_MINUTES",
                        expected: "a positive number of minutes",
                        value: raw,
                    });
                }
            },
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                var: "USE_PERSISTENT_STORES",
                expected: "true or false",
                value: raw,
            })?,
        };

        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DATABASE_MAX_CONNECTIONS",
                        expected: "a positive integer",
                        value: raw,
                    });
                }
            },
        };

        let admin = get("ADMIN_PASSWORD").map(|password| AdminSeed {
            username: get("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            email: get("ADMIN_EMAIL").unwrap_or_else(|| "admin@example.com".to_string()),
            password,
        });

        Ok(Self {
            bind_addr,
            jwt_secret,
            access_token_ttl: Duration::minutes(ttl_minutes),
            use_persistent_stores,
            database_url,
            database_max_connections,
            admin,
        })
    }

    /// In-memory stores on an ephemeral port.
    pub fn in_memory(jwt_secret: impl Into<String>, admin: Option<AdminSeed>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            admin,
        }
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone().into_bytes(),
            access_token_ttl: self.access_token_ttl,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
