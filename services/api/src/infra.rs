use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use outreach_engine::config::EngineConfig;
use outreach_engine::engagement::{
    EngagementService, InMemoryEventLedger, InMemoryNotifier, InMemoryProspectRepository,
    ScoringEngine, ScoringPolicy,
};
use outreach_engine::error::AppError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type MemoryEngagementService =
    EngagementService<InMemoryProspectRepository, InMemoryEventLedger, InMemoryNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Load the configured policy file, or the built-in policy when none is set, and validate it.
pub(crate) fn load_engine(config: &EngineConfig) -> Result<ScoringEngine, AppError> {
    let policy = match &config.policy_path {
        Some(path) => {
            let policy = ScoringPolicy::from_path(path)?;
            info!(path = %path.display(), version = %policy.version, "scoring policy loaded");
            policy
        }
        None => ScoringPolicy::default(),
    };
    Ok(ScoringEngine::new(policy)?)
}

/// Engagement service over the in-process stores.
pub(crate) fn in_memory_service(
    engine: ScoringEngine,
    max_write_attempts: u32,
) -> MemoryEngagementService {
    EngagementService::new(
        Arc::new(InMemoryProspectRepository::default()),
        Arc::new(InMemoryEventLedger::default()),
        Arc::new(InMemoryNotifier::default()),
        engine,
    )
    .with_max_write_attempts(max_write_attempts)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
