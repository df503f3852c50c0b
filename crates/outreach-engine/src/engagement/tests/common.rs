use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::engagement::domain::{
    EngagementEvent, EngagementEventType, ProspectId, ProspectStatus, ScoringState,
};
use crate::engagement::memory::{
    InMemoryEventLedger, InMemoryNotifier, InMemoryProspectRepository,
};
use crate::engagement::repository::{ProspectRepository, RepositoryError};
use crate::engagement::service::{EngagementService, NewProspect};
use crate::engagement::{ScoringEngine, ScoringPolicy};

pub(super) type MemoryService =
    EngagementService<InMemoryProspectRepository, InMemoryEventLedger, InMemoryNotifier>;

pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .expect("valid base time")
}

pub(super) fn days(offset: i64) -> DateTime<Utc> {
    base_time() + Duration::days(offset)
}

pub(super) fn engine() -> ScoringEngine {
    ScoringEngine::new(ScoringPolicy::default()).expect("default policy is valid")
}

pub(super) fn prospect_id(raw: &str) -> ProspectId {
    ProspectId(raw.to_string())
}

pub(super) fn fresh_state(raw_id: &str) -> ScoringState {
    engine().initial_state(prospect_id(raw_id), base_time(), 0)
}

pub(super) fn state_with(score: i32, status: ProspectStatus) -> ScoringState {
    let engine = engine();
    let mut state = engine.initial_state(prospect_id("p-fixed"), base_time(), 0);
    state.score = score;
    state.group = engine.group_for(score);
    state.status = status;
    state
}

pub(super) fn event(
    id: &str,
    prospect: &str,
    event_type: EngagementEventType,
    at: DateTime<Utc>,
) -> EngagementEvent {
    EngagementEvent::new(id, prospect_id(prospect), event_type, at)
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryProspectRepository>,
    Arc<InMemoryEventLedger>,
    Arc<InMemoryNotifier>,
) {
    let repository = Arc::new(InMemoryProspectRepository::default());
    let ledger = Arc::new(InMemoryEventLedger::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = EngagementService::new(
        repository.clone(),
        ledger.clone(),
        notifier.clone(),
        engine(),
    );
    (service, repository, ledger, notifier)
}

pub(super) fn new_prospect(raw_id: &str) -> NewProspect {
    NewProspect {
        prospect_id: prospect_id(raw_id),
        created_at: base_time(),
        current_stage: 1,
    }
}

/// Repository whose stored version always moves before the caller can write.
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryProspectRepository,
}

impl ProspectRepository for RacingRepository {
    fn insert(&self, state: ScoringState) -> Result<ScoringState, RepositoryError> {
        self.inner.insert(state)
    }

    fn fetch(&self, id: &ProspectId) -> Result<Option<ScoringState>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        _state: ScoringState,
    ) -> Result<ScoringState, RepositoryError> {
        Err(RepositoryError::StaleWrite {
            expected: expected_version,
            actual: expected_version + 1,
        })
    }

    fn active(&self) -> Result<Vec<ProspectId>, RepositoryError> {
        self.inner.active()
    }
}

/// Repository that reports a stale write for the first `failures` swaps, then behaves normally.
pub(super) struct FlakyRepository {
    inner: InMemoryProspectRepository,
    failures_left: Mutex<u32>,
}

impl FlakyRepository {
    pub(super) fn failing(failures: u32) -> Self {
        Self {
            inner: InMemoryProspectRepository::default(),
            failures_left: Mutex::new(failures),
        }
    }
}

impl ProspectRepository for FlakyRepository {
    fn insert(&self, state: ScoringState) -> Result<ScoringState, RepositoryError> {
        self.inner.insert(state)
    }

    fn fetch(&self, id: &ProspectId) -> Result<Option<ScoringState>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        state: ScoringState,
    ) -> Result<ScoringState, RepositoryError> {
        let mut failures_left = self.failures_left.lock().expect("failure counter");
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(RepositoryError::StaleWrite {
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        drop(failures_left);
        self.inner.compare_and_swap(expected_version, state)
    }

    fn active(&self) -> Result<Vec<ProspectId>, RepositoryError> {
        self.inner.active()
    }
}

/// Repository that scores and stores `pending` just before the first swap it is asked to make,
/// as if another worker wrote between the caller's read and its write.
pub(super) struct InterleavingRepository {
    pub(super) inner: InMemoryProspectRepository,
    pending: Mutex<Option<EngagementEvent>>,
}

impl InterleavingRepository {
    pub(super) fn landing_before_first_write(pending: EngagementEvent) -> Self {
        Self {
            inner: InMemoryProspectRepository::default(),
            pending: Mutex::new(Some(pending)),
        }
    }
}

impl ProspectRepository for InterleavingRepository {
    fn insert(&self, state: ScoringState) -> Result<ScoringState, RepositoryError> {
        self.inner.insert(state)
    }

    fn fetch(&self, id: &ProspectId) -> Result<Option<ScoringState>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        state: ScoringState,
    ) -> Result<ScoringState, RepositoryError> {
        let pending = self.pending.lock().expect("pending event").take();
        if let Some(event) = pending {
            let current = self
                .inner
                .fetch(&event.prospect_id)?
                .ok_or(RepositoryError::NotFound)?;
            let outcome = engine().apply_event(&current, &event);
            self.inner.compare_and_swap(current.version, outcome.state)?;
        }
        self.inner.compare_and_swap(expected_version, state)
    }

    fn active(&self) -> Result<Vec<ProspectId>, RepositoryError> {
        self.inner.active()
    }
}

pub(super) struct UnavailableRepository;

impl ProspectRepository for UnavailableRepository {
    fn insert(&self, _state: ScoringState) -> Result<ScoringState, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ProspectId) -> Result<Option<ScoringState>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _expected_version: u64,
        _state: ScoringState,
    ) -> Result<ScoringState, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn active(&self) -> Result<Vec<ProspectId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
