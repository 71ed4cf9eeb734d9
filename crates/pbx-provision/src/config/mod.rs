use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::provisioning::ReloadStrategy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the provisioning service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the engine's configuration tree lives and how the engine is asked
/// to adopt new documents.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the engine's configuration tree; document paths are relative
    /// to this and stable across passes.
    pub config_root: PathBuf,
    /// Liveness-probe command line.
    pub probe_command: Vec<String>,
    /// Ordered reload strategies, tried until one succeeds.
    pub reload_strategies: Vec<ReloadStrategy>,
    /// Timeout applied to every probe and reload command.
    pub command_timeout: Duration,
}

impl EngineConfig {
    fn load() -> Result<Self, ConfigError> {
        let config_root = PathBuf::from(
            env::var("APP_ENGINE_CONFIG_ROOT").unwrap_or_else(|_| "/etc/switch/conf".to_string()),
        );

        let probe_command = split_command(
            &env::var("APP_ENGINE_PROBE").unwrap_or_else(|_| "fs_cli -x status".to_string()),
        )?;

        let reload_spec = env::var("APP_ENGINE_RELOAD_COMMANDS").unwrap_or_else(|_| {
            "fs_cli -x reloadxml;fs_cli -x sofia profile all rescan".to_string()
        });
        let mut reload_strategies = Vec::new();
        for (index, spec) in reload_spec.split(';').enumerate() {
            let command = split_command(spec)?;
            reload_strategies.push(ReloadStrategy::new(format!("strategy-{}", index + 1), command));
        }

        let timeout_ms = env::var("APP_ENGINE_COMMAND_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            config_root,
            probe_command,
            reload_strategies,
            command_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn split_command(raw: &str) -> Result<Vec<String>, ConfigError> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(ConfigError::EmptyCommand);
    }
    Ok(parts)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    EmptyCommand,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "APP_ENGINE_COMMAND_TIMEOUT_MS must be milliseconds as u64")
            }
            ConfigError::EmptyCommand => {
                write!(f, "engine command lines must contain at least a program name")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
