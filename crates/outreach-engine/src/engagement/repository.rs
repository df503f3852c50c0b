use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{EngagementEvent, EventId, ProspectId, ScoringState};

/// Storage abstraction for prospect scoring state.
///
/// Writes go through [`ProspectRepository::compare_and_swap`] so concurrent event and decay paths
/// serialize per prospect without a global lock.
pub trait ProspectRepository: Send + Sync {
    fn insert(&self, state: ScoringState) -> Result<ScoringState, RepositoryError>;
    fn fetch(&self, id: &ProspectId) -> Result<Option<ScoringState>, RepositoryError>;
    /// Store `state` only if the stored version still equals `expected_version`. The stored copy
    /// comes back with its version bumped.
    fn compare_and_swap(
        &self,
        expected_version: u64,
        state: ScoringState,
    ) -> Result<ScoringState, RepositoryError>;
    /// Prospects the decay sweep should visit (neither bounced nor handed off).
    fn active(&self) -> Result<Vec<ProspectId>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("prospect already exists")]
    Conflict,
    #[error("prospect not found")]
    NotFound,
    #[error("stale write: expected version {expected}, found {actual}")]
    StaleWrite { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Append-only engagement history. Appending doubles as event-id de-duplication.
pub trait EventLedger: Send + Sync {
    fn append(&self, event: EngagementEvent) -> Result<LedgerAppend, LedgerError>;
    /// Drop an entry whose scoring write never landed, so a redelivery is scored rather than
    /// reported as a duplicate.
    fn retract(&self, event_id: &EventId) -> Result<(), LedgerError>;
    fn events_for(&self, prospect_id: &ProspectId) -> Result<Vec<EngagementEvent>, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAppend {
    Appended,
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("event ledger unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for dashboard toasts, hot-lead alerts, and similar consumers.
pub trait EngagementNotifier: Send + Sync {
    fn notify(&self, notification: EngagementNotification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementNotification {
    pub template: String,
    pub prospect_id: ProspectId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
