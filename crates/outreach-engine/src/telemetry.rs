use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(f, "invalid log filter '{value}': unable to build EnvFilter")
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// `RUST_LOG` wins when present; otherwise the configured level applies.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::EnvFilter {
        value: config.log_level.clone(),
        source,
    })
}

/// Install the global fmt subscriber. Fails if one is already installed.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "outreach_engine=loud".to_string(),
        };
        match env_filter(&config) {
            Err(TelemetryError::EnvFilter { value, .. }) => {
                assert_eq!(value, "outreach_engine=loud")
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_directive_lists() {
        let config = TelemetryConfig {
            log_level: "info,outreach_engine=debug".to_string(),
        };
        assert!(env_filter(&config).is_ok());
    }
}
