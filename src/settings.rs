//! Runtime settings from environment variables.

use crate::error::ConfigError;
use crate::session::PoolSettings;
use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://db.sqlite3?mode=rwc";
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub pool: PoolSettings,
    pub host: String,
    pub port: u16,
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            pool: PoolSettings::default(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    /// Read `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS`, `HOST`, `PORT`
    /// and `BODY_LIMIT_BYTES`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load a `.env` file from the working directory when present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_env()
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let settings = Settings {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            pool: PoolSettings {
                max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", defaults.pool.max_connections)?,
                min_connections: parse_or(get("DATABASE_MIN_CONNECTIONS"), "DATABASE_MIN_CONNECTIONS", defaults.pool.min_connections)?,
            },
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            body_limit: parse_or(get("BODY_LIMIT_BYTES"), "BODY_LIMIT_BYTES", defaults.body_limit)?,
        };
        if settings.pool.max_connections == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "DATABASE_MAX_CONNECTIONS",
                value: "0".into(),
            });
        }
        if settings.pool.min_connections > settings.pool.max_connections {
            return Err(ConfigError::InvalidSetting {
                key: "DATABASE_MIN_CONNECTIONS",
                value: settings.pool.min_connections.to_string(),
            });
        }
        Ok(settings)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidSetting { key: "HOST", value: raw })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidSetting { key, value: v }),
    }
}
