use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

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

/// Top-level configuration for the application.
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

        let policy_path = env::var("ENGINE_POLICY_PATH")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let sweep_interval_secs = match env::var("DECAY_SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidSweepInterval)?,
            Err(_) => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        let max_write_attempts = match env::var("ENGINE_MAX_WRITE_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidWriteAttempts)?,
            Err(_) => DEFAULT_MAX_WRITE_ATTEMPTS,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig {
                policy_path,
                sweep_interval: Duration::from_secs(sweep_interval_secs),
                max_write_attempts,
            },
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Scoring policy source, decay cadence, and write retry budget.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// JSON policy file; the built-in default policy applies when unset.
    pub policy_path: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub max_write_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSweepInterval,
    InvalidWriteAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSweepInterval => {
                write!(f, "DECAY_SWEEP_INTERVAL_SECS must be a positive integer")
            }
            ConfigError::InvalidWriteAttempts => {
                write!(f, "ENGINE_MAX_WRITE_ATTEMPTS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSweepInterval
            | ConfigError::InvalidWriteAttempts => None,
        }
    }
}
