//! Inactivity decay.
//!
//! A decay step is keyed on the current quiet window rather than on sweep invocations: the window
//! opens at the later of the last real engagement (or creation) and the last applied decay, so
//! re-running a sweep for the same `now` never decays twice.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ProspectId, ProspectStatus, ScoringState};
use super::lifecycle::{derive_status, StatusTrigger};
use super::scoring::{ScoringEffect, ScoringEngine, ScoringOutcome};

/// Whole days elapsed from `from` to `to`; zero when `to` precedes `from`.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days().max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayEligibility {
    Eligible { quiet_days: i64 },
    Exempt(ProspectStatus),
    AtFloor,
    NotDue { quiet_days: i64 },
}

impl ScoringEngine {
    pub fn decay_eligibility(&self, state: &ScoringState, now: DateTime<Utc>) -> DecayEligibility {
        if state.status.is_decay_exempt() {
            return DecayEligibility::Exempt(state.status);
        }

        if state.score <= self.policy().min_score {
            return DecayEligibility::AtFloor;
        }

        let anchor = state.last_engagement_at.unwrap_or(state.created_at);
        let window_start = match state.last_decay_at {
            Some(decayed_at) if decayed_at > anchor => decayed_at,
            _ => anchor,
        };

        let quiet_days = days_between(window_start, now);
        if quiet_days >= self.policy().decay_after_days {
            DecayEligibility::Eligible { quiet_days }
        } else {
            DecayEligibility::NotDue { quiet_days }
        }
    }

    /// One decay step, or `None` when the prospect is not due.
    ///
    /// Counters and `last_engagement_at` are left alone; only score, group, status, and the decay
    /// marker move.
    pub fn apply_decay(&self, state: &ScoringState, now: DateTime<Utc>) -> Option<ScoringOutcome> {
        let DecayEligibility::Eligible { .. } = self.decay_eligibility(state, now) else {
            return None;
        };

        let policy = self.policy();
        let mut next = state.clone();
        next.score = policy.clamp_score(state.score.saturating_sub(policy.decay_amount));
        next.group = self.group_for(next.score);
        next.last_decay_at = Some(now);
        next.policy_version = policy.version.clone();

        let transition = derive_status(policy, state, &next, StatusTrigger::Decay);
        next.status = transition.to;

        Some(ScoringOutcome {
            delta: next.score.saturating_sub(state.score),
            state: next,
            policy_delta: -policy.decay_amount,
            transition,
            effect: ScoringEffect::Decayed,
        })
    }
}

/// Cooperative cancellation for sweeps. Cloned handles share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Outcome of one sweep over the active prospects.
#[derive(Debug, Clone, Serialize)]
pub struct DecaySweepReport {
    pub now: DateTime<Utc>,
    pub examined: usize,
    pub decayed: Vec<(ProspectId, ScoringState)>,
    pub skipped: usize,
    pub conflicts: usize,
    pub cancelled: bool,
}

impl DecaySweepReport {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            examined: 0,
            decayed: Vec::new(),
            skipped: 0,
            conflicts: 0,
            cancelled: false,
        }
    }
}

/// Per-prospect result of one sweep step.
pub(crate) enum SweepStep {
    Decayed(ScoringState),
    Skipped,
    Conflict,
}

/// Shared sweep loop: stops taking new items once `cancel` trips and tallies each step.
pub(crate) fn sweep_each<T, E, I, F>(
    now: DateTime<Utc>,
    items: I,
    cancel: &CancellationToken,
    mut step: F,
) -> Result<DecaySweepReport, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<SweepStep, E>,
{
    let mut report = DecaySweepReport::new(now);
    for item in items {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        report.examined += 1;
        match step(item)? {
            SweepStep::Decayed(state) => report.decayed.push((state.prospect_id.clone(), state)),
            SweepStep::Skipped => report.skipped += 1,
            SweepStep::Conflict => report.conflicts += 1,
        }
    }
    Ok(report)
}

/// Pure sweep over in-hand snapshots; stops taking new prospects once `cancel` trips.
pub fn decay_sweep<'a, I>(
    engine: &ScoringEngine,
    states: I,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> DecaySweepReport
where
    I: IntoIterator<Item = &'a ScoringState>,
{
    let swept = sweep_each(now, states, cancel, |state| {
        Ok::<_, Infallible>(match engine.apply_decay(state, now) {
            Some(outcome) => SweepStep::Decayed(outcome.state),
            None => SweepStep::Skipped,
        })
    });
    match swept {
        Ok(report) => report,
        Err(never) => match never {},
    }
}
