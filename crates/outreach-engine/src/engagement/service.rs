use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::decay::{sweep_each, CancellationToken, DecaySweepReport, SweepStep};
use super::domain::{EngagementEvent, ProspectId, ProspectStatus, ScoringState};
use super::lifecycle::StatusAction;
use super::repository::{
    EngagementNotification, EngagementNotifier, EventLedger, LedgerAppend, LedgerError,
    ProspectRepository, RepositoryError,
};
use super::scoring::{NoOpReason, ScoringEffect, ScoringEngine, ScoringOutcome};

const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

/// Service composing the scoring engine with storage, the event ledger, and notifications.
///
/// Every mutation, live or scheduled, runs the same read-compute-write cycle guarded by the
/// repository's version check, retrying on stale reads.
pub struct EngagementService<R, L, N> {
    repository: Arc<R>,
    ledger: Arc<L>,
    notifier: Arc<N>,
    engine: Arc<ScoringEngine>,
    max_write_attempts: u32,
}

/// Creation request for a prospect's scoring state.
#[derive(Debug, Clone)]
pub struct NewProspect {
    pub prospect_id: ProspectId,
    pub created_at: DateTime<Utc>,
    pub current_stage: u32,
}

/// Result of ingesting one event.
#[derive(Debug, Clone)]
pub struct EventReceipt {
    pub outcome: ScoringOutcome,
    /// The ledger already held this event id; nothing was scored.
    pub duplicate: bool,
}

impl<R, L, N> EngagementService<R, L, N>
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    pub fn new(repository: Arc<R>, ledger: Arc<L>, notifier: Arc<N>, engine: ScoringEngine) -> Self {
        Self {
            repository,
            ledger,
            notifier,
            engine: Arc::new(engine),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn create_prospect(
        &self,
        prospect: NewProspect,
    ) -> Result<ScoringState, EngagementServiceError> {
        let state = self.engine.initial_state(
            prospect.prospect_id,
            prospect.created_at,
            prospect.current_stage,
        );
        let stored = self.repository.insert(state)?;
        debug!(prospect_id = %stored.prospect_id, "scoring state created");
        Ok(stored)
    }

    pub fn get(&self, prospect_id: &ProspectId) -> Result<ScoringState, EngagementServiceError> {
        let state = self
            .repository
            .fetch(prospect_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(state)
    }

    pub fn events(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Vec<EngagementEvent>, EngagementServiceError> {
        self.get(prospect_id)?;
        Ok(self.ledger.events_for(prospect_id)?)
    }

    /// Append the event to the ledger and score it. Replays of a known event id are no-ops.
    ///
    /// The ledger entry is released again when the scoring write fails, so only scored events
    /// count as seen.
    pub fn record_event(
        &self,
        event: EngagementEvent,
    ) -> Result<EventReceipt, EngagementServiceError> {
        let current = self.get(&event.prospect_id)?;

        if self.ledger.append(event.clone())? == LedgerAppend::Duplicate {
            debug!(
                prospect_id = %event.prospect_id,
                event_id = %event.id,
                "duplicate event delivery ignored"
            );
            return Ok(EventReceipt {
                outcome: ScoringOutcome::unchanged(&current, NoOpReason::DuplicateEvent),
                duplicate: true,
            });
        }

        let committed = self.commit(&event.prospect_id, |state| {
            self.engine.apply_event(state, &event)
        });
        let outcome = match committed {
            Ok(outcome) => outcome,
            Err(error) => {
                // The id must not stay claimed, or the provider's redelivery is discarded.
                if let Err(retract_error) = self.ledger.retract(&event.id) {
                    warn!(
                        prospect_id = %event.prospect_id,
                        event_id = %event.id,
                        error = %retract_error,
                        "unable to release ledger entry after failed write"
                    );
                }
                return Err(error);
            }
        };

        if outcome.changes_state() {
            info!(
                prospect_id = %event.prospect_id,
                event_type = %event.event_type,
                score = outcome.state.score,
                group = outcome.state.group,
                status = ?outcome.state.status,
                delta = outcome.delta,
                "engagement event scored"
            );
            self.publish(&outcome);
        }

        Ok(EventReceipt {
            outcome,
            duplicate: false,
        })
    }

    pub fn apply_status_action(
        &self,
        prospect_id: &ProspectId,
        action: StatusAction,
    ) -> Result<ScoringOutcome, EngagementServiceError> {
        let outcome = self.commit(prospect_id, |state| {
            self.engine.apply_status_action(state, action)
        })?;

        if outcome.changes_state() {
            info!(
                prospect_id = %prospect_id,
                action = ?action,
                from = ?outcome.transition.from,
                to = ?outcome.transition.to,
                "manual status action applied"
            );
            self.publish(&outcome);
        }

        Ok(outcome)
    }

    /// Decay every active prospect that has been quiet for a full window as of `now`.
    ///
    /// Safe to re-run for the same `now`. Cancellation stops the sweep between prospects; each
    /// prospect write is independent, so work already committed stays committed.
    pub fn run_decay_sweep(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<DecaySweepReport, EngagementServiceError> {
        let report = sweep_each(now, self.repository.active()?, cancel, |prospect_id| {
            let committed = self.commit(&prospect_id, |state| {
                self.engine
                    .apply_decay(state, now)
                    .unwrap_or_else(|| ScoringOutcome::unchanged(state, NoOpReason::DecayNotDue))
            });

            match committed {
                Ok(outcome) if outcome.effect == ScoringEffect::Decayed => {
                    self.publish(&outcome);
                    Ok(SweepStep::Decayed(outcome.state))
                }
                Ok(_) => Ok(SweepStep::Skipped),
                Err(EngagementServiceError::WriteContention { .. }) => {
                    warn!(prospect_id = %prospect_id, "decay skipped after repeated write conflicts");
                    Ok(SweepStep::Conflict)
                }
                Err(EngagementServiceError::Repository(RepositoryError::NotFound)) => {
                    Ok(SweepStep::Skipped)
                }
                Err(other) => Err(other),
            }
        })?;

        info!(
            now = %now,
            examined = report.examined,
            decayed = report.decayed.len(),
            skipped = report.skipped,
            conflicts = report.conflicts,
            cancelled = report.cancelled,
            "decay sweep finished"
        );

        Ok(report)
    }

    fn commit<F>(
        &self,
        prospect_id: &ProspectId,
        compute: F,
    ) -> Result<ScoringOutcome, EngagementServiceError>
    where
        F: Fn(&ScoringState) -> ScoringOutcome,
    {
        for attempt in 1..=self.max_write_attempts {
            let current = self.get(prospect_id)?;
            let mut outcome = compute(&current);
            if !outcome.changes_state() {
                return Ok(outcome);
            }

            match self
                .repository
                .compare_and_swap(current.version, outcome.state.clone())
            {
                Ok(stored) => {
                    outcome.state = stored;
                    return Ok(outcome);
                }
                Err(RepositoryError::StaleWrite { expected, actual }) => {
                    warn!(
                        prospect_id = %prospect_id,
                        attempt,
                        expected,
                        actual,
                        "stale read while writing scoring state, retrying"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngagementServiceError::WriteContention {
            prospect_id: prospect_id.clone(),
            attempts: self.max_write_attempts,
        })
    }

    fn publish(&self, outcome: &ScoringOutcome) {
        let state = &outcome.state;
        let mut notifications = Vec::new();

        if outcome.delta != 0 {
            let template = if outcome.effect == ScoringEffect::Decayed {
                "score_decayed"
            } else {
                "score_changed"
            };
            let mut details = BTreeMap::new();
            details.insert("delta".to_string(), outcome.delta.to_string());
            details.insert("score".to_string(), state.score.to_string());
            details.insert("group".to_string(), state.group.to_string());
            details.insert(
                "group_label".to_string(),
                self.engine.group_label(state.group).to_string(),
            );
            notifications.push(EngagementNotification {
                template: template.to_string(),
                prospect_id: state.prospect_id.clone(),
                details,
            });
        }

        if outcome.transition.is_change() {
            let template = match outcome.transition.to {
                ProspectStatus::Bounced => "prospect_bounced",
                ProspectStatus::Handoff => "hot_lead_handoff",
                _ => "status_changed",
            };
            let mut details = BTreeMap::new();
            details.insert(
                "from".to_string(),
                outcome.transition.from.label().to_string(),
            );
            details.insert("to".to_string(), outcome.transition.to.label().to_string());
            details.insert("score".to_string(), state.score.to_string());
            notifications.push(EngagementNotification {
                template: template.to_string(),
                prospect_id: state.prospect_id.clone(),
                details,
            });
        }

        for notification in notifications {
            let template = notification.template.clone();
            if let Err(error) = self.notifier.notify(notification) {
                warn!(
                    prospect_id = %state.prospect_id,
                    template = %template,
                    %error,
                    "engagement notification dropped"
                );
            }
        }
    }
}

/// Error raised by the engagement service.
#[derive(Debug, thiserror::Error)]
pub enum EngagementServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("prospect {prospect_id} kept changing underneath {attempts} write attempts")]
    WriteContention {
        prospect_id: ProspectId,
        attempts: u32,
    },
}
