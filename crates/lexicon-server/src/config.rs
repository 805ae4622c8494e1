//! Server configuration from environment variables.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LINK_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_LINK_JOB_TIMEOUT_SECS: u64 = 120;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Server port to listen on.
    pub port: u16,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// CORS allowed origins (comma-separated or "*" for all).
    pub cors_allowed_origins: String,
    /// How often the link worker polls its queue.
    pub link_poll_interval: Duration,
    /// Upper bound on a single cross-linking pass.
    pub link_job_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`: Database connection string
    ///
    /// Optional:
    /// - `PORT`: Server port (default: 3000)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    /// - `CORS_ALLOWED_ORIGINS`: Allowed CORS origins (default: "*")
    /// - `LINK_POLL_INTERVAL_MS`: Link worker poll interval (default: 250)
    /// - `LINK_JOB_TIMEOUT_SECS`: Link pass timeout (default: 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = parse_var(&lookup, "PORT", DEFAULT_PORT)?;
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string());

        let poll_ms = parse_var(&lookup, "LINK_POLL_INTERVAL_MS", DEFAULT_LINK_POLL_INTERVAL_MS)?;
        if poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "LINK_POLL_INTERVAL_MS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        let timeout_secs =
            parse_var(&lookup, "LINK_JOB_TIMEOUT_SECS", DEFAULT_LINK_JOB_TIMEOUT_SECS)?;

        Ok(Self {
            database_url,
            port,
            log_level,
            cors_allowed_origins,
            link_poll_interval: Duration::from_millis(poll_ms),
            link_job_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Get the socket address for the server.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}
