use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;

const DEFAULT_POOL_SIZE: &str = "10";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_TTL_MINUTES: &str = "480";
/// One year.
const MAX_SESSION_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Settings every subcommand needs to reach the store.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub pool_size: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            pool_size: try_load("DATABASE_POOL_SIZE", DEFAULT_POOL_SIZE)?,
        })
    }
}

/// Settings for the HTTP server, on top of [`Config`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: Config,
    pub bind_addr: SocketAddr,
    pub admin_password: String,
    pub secret_key: String,
    pub session_ttl: Duration,
}

impl ServerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let store = Config::load()?;
        let session_ttl =
            session_ttl(try_load("SESSION_TTL_MINUTES", DEFAULT_SESSION_TTL_MINUTES)?)?;

        Ok(Self {
            store,
            bind_addr: try_load("BIND_ADDR", DEFAULT_BIND_ADDR)?,
            admin_password: require("ADMIN_PASSWORD")?,
            secret_key: require("SECRET_KEY")?,
            session_ttl,
        })
    }
}

fn session_ttl(minutes: i64) -> Result<Duration, ConfigError> {
    if !(1..=MAX_SESSION_TTL_MINUTES).contains(&minutes) {
        return Err(ConfigError::Invalid {
            key: "SESSION_TTL_MINUTES",
            message: format!("must be between 1 and {MAX_SESSION_TTL_MINUTES}, got {minutes}"),
        });
    }
    Ok(Duration::minutes(minutes))
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            message: e.to_string(),
        }
    })
}
