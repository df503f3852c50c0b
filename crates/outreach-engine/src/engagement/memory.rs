//! In-process repository, ledger, and notifier used by the API service, the demo, and tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{EngagementEvent, EventId, ProspectId, ScoringState};
use super::repository::{
    EngagementNotification, EngagementNotifier, EventLedger, LedgerAppend, LedgerError,
    NotifyError, ProspectRepository, RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, String> {
    mutex
        .lock()
        .map_err(|_| "in-memory store mutex poisoned".to_string())
}

#[derive(Default, Clone)]
pub struct InMemoryProspectRepository {
    records: Arc<Mutex<HashMap<ProspectId, ScoringState>>>,
}

impl InMemoryProspectRepository {
    pub fn len(&self) -> usize {
        lock(&self.records).map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProspectRepository for InMemoryProspectRepository {
    fn insert(&self, state: ScoringState) -> Result<ScoringState, RepositoryError> {
        let mut guard = lock(&self.records).map_err(RepositoryError::Unavailable)?;
        if guard.contains_key(&state.prospect_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(state.prospect_id.clone(), state.clone());
        Ok(state)
    }

    fn fetch(&self, id: &ProspectId) -> Result<Option<ScoringState>, RepositoryError> {
        let guard = lock(&self.records).map_err(RepositoryError::Unavailable)?;
        Ok(guard.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        mut state: ScoringState,
    ) -> Result<ScoringState, RepositoryError> {
        let mut guard = lock(&self.records).map_err(RepositoryError::Unavailable)?;
        let stored = guard
            .get_mut(&state.prospect_id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::StaleWrite {
                expected: expected_version,
                actual: stored.version,
            });
        }
        state.version = expected_version + 1;
        *stored = state.clone();
        Ok(state)
    }

    fn active(&self) -> Result<Vec<ProspectId>, RepositoryError> {
        let guard = lock(&self.records).map_err(RepositoryError::Unavailable)?;
        let mut ids: Vec<ProspectId> = guard
            .values()
            .filter(|state| !state.status.is_decay_exempt())
            .map(|state| state.prospect_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Default)]
struct LedgerInner {
    seen: HashSet<EventId>,
    events: Vec<EngagementEvent>,
}

#[derive(Default, Clone)]
pub struct InMemoryEventLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

impl InMemoryEventLedger {
    pub fn len(&self) -> usize {
        lock(&self.inner).map(|guard| guard.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLedger for InMemoryEventLedger {
    fn append(&self, event: EngagementEvent) -> Result<LedgerAppend, LedgerError> {
        let mut guard = lock(&self.inner).map_err(LedgerError::Unavailable)?;
        if !guard.seen.insert(event.id.clone()) {
            return Ok(LedgerAppend::Duplicate);
        }
        guard.events.push(event);
        Ok(LedgerAppend::Appended)
    }

    fn retract(&self, event_id: &EventId) -> Result<(), LedgerError> {
        let mut guard = lock(&self.inner).map_err(LedgerError::Unavailable)?;
        if guard.seen.remove(event_id) {
            guard.events.retain(|event| &event.id != event_id);
        }
        Ok(())
    }

    fn events_for(&self, prospect_id: &ProspectId) -> Result<Vec<EngagementEvent>, LedgerError> {
        let guard = lock(&self.inner).map_err(LedgerError::Unavailable)?;
        Ok(guard
            .events
            .iter()
            .filter(|event| &event.prospect_id == prospect_id)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<EngagementNotification>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<EngagementNotification> {
        lock(&self.events)
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl EngagementNotifier for InMemoryNotifier {
    fn notify(&self, notification: EngagementNotification) -> Result<(), NotifyError> {
        lock(&self.events)
            .map_err(NotifyError::Transport)?
            .push(notification);
        Ok(())
    }
}
