//! Bridge configuration
//!
//! Read from environment variables (optionally seeded from a `.env` file).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use zkbridge_core::constants::DEFAULT_TIMEOUT_MS;

use crate::client::Protocol;
use crate::session::SessionDefaults;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment environment: development | staging | production
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Other(String),
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl From<&str> for Environment {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Bridge server configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// HTTP bind host
    pub host: String,
    /// HTTP bind port
    pub port: u16,
    /// Credential for `/api/*`; `None` leaves the API open
    pub api_key: Option<String>,
    /// Default device address
    pub device_ip: Option<String>,
    pub device_port: u16,
    /// Connect and per-reply timeout
    pub device_timeout: Duration,
    pub device_protocol: Protocol,
    /// CommKey password
    pub device_password: u32,
    pub environment: Environment,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: None,
            device_ip: None,
            device_port: zkbridge_core::DEFAULT_PORT,
            device_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            device_protocol: Protocol::Udp,
            device_password: 0,
            environment: Environment::Development,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT")?.unwrap_or(defaults.port),
            api_key: get("API_KEY"),
            device_ip: get("DEVICE_IP"),
            device_port: parse(&get, "DEVICE_PORT")?.unwrap_or(defaults.device_port),
            device_timeout: parse::<u64>(&get, "DEVICE_TIMEOUT")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.device_timeout),
            device_protocol: parse(&get, "DEVICE_PROTOCOL")?.unwrap_or(defaults.device_protocol),
            device_password: parse(&get, "DEVICE_PASSWORD")?.unwrap_or(defaults.device_password),
            environment: get("ENVIRONMENT")
                .or_else(|| get("NODE_ENV"))
                .map(|v| Environment::from(v.as_str()))
                .unwrap_or(defaults.environment),
        })
    }

    /// HTTP bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect fallbacks for the device session
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            ip: self.device_ip.clone(),
            port: self.device_port,
            timeout: self.device_timeout,
        }
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    get(name)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}
