use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    EngagementCounter, EngagementEvent, EngagementEventType, ProspectId, ProspectScoreView,
    ProspectStatus, ScoringState,
};
use super::lifecycle::{derive_status, StatusAction, StatusTransition, StatusTrigger};
use super::policy::{PolicyError, ScoringPolicy};

/// Why a call produced no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    TerminalProspect,
    UnrecognizedEvent,
    DuplicateEvent,
    StatusUnchanged,
    DecayNotDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringEffect {
    Scored,
    Bounced,
    Decayed,
    StatusAction,
    Ignored(NoOpReason),
}

/// Next state plus the audit trail of how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringOutcome {
    pub state: ScoringState,
    /// Points the policy assigns to the trigger, before clamping.
    pub policy_delta: i32,
    /// Score movement actually applied.
    pub delta: i32,
    pub transition: StatusTransition,
    pub effect: ScoringEffect,
}

impl ScoringOutcome {
    pub fn unchanged(state: &ScoringState, reason: NoOpReason) -> Self {
        Self {
            state: state.clone(),
            policy_delta: 0,
            delta: 0,
            transition: StatusTransition::unchanged(state.status),
            effect: ScoringEffect::Ignored(reason),
        }
    }

    pub fn changes_state(&self) -> bool {
        !matches!(self.effect, ScoringEffect::Ignored(_))
    }
}

/// Stateless engine bound to one validated policy.
///
/// Every method is pure: it reads a state snapshot and returns the next one. Persisting the result
/// and serializing writes per prospect is the caller's job.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    /// Refuses to build around a policy whose thresholds would force guessing a group.
    pub fn new(policy: ScoringPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn initial_state(
        &self,
        prospect_id: ProspectId,
        created_at: DateTime<Utc>,
        current_stage: u32,
    ) -> ScoringState {
        let score = self.policy.min_score;
        ScoringState {
            prospect_id,
            score,
            group: self.group_for(score),
            status: ProspectStatus::Cold,
            opens: 0,
            clicks: 0,
            replies: 0,
            last_engagement_at: None,
            last_decay_at: None,
            current_stage,
            created_at,
            policy_version: self.policy.version.clone(),
            version: 0,
        }
    }

    pub fn group_for(&self, score: i32) -> u8 {
        let score = self.policy.clamp_score(score);
        self.policy
            .threshold_for(score)
            .or_else(|| self.policy.groups.first())
            .map(|threshold| threshold.group)
            .unwrap_or_default()
    }

    pub fn group_label(&self, group: u8) -> &str {
        self.policy
            .groups
            .iter()
            .find(|threshold| threshold.group == group)
            .map(|threshold| threshold.label.as_str())
            .unwrap_or("Unknown")
    }

    pub fn apply_event(&self, state: &ScoringState, event: &EngagementEvent) -> ScoringOutcome {
        if state.status.is_terminal() {
            debug!(
                prospect_id = %state.prospect_id,
                event_id = %event.id,
                event_type = %event.event_type,
                "event for bounced prospect recorded without transition"
            );
            return ScoringOutcome::unchanged(state, NoOpReason::TerminalProspect);
        }

        if !event.event_type.is_recognized() {
            debug!(
                prospect_id = %state.prospect_id,
                event_id = %event.id,
                event_type = %event.event_type,
                "unrecognized event type scored as neutral"
            );
            return ScoringOutcome::unchanged(state, NoOpReason::UnrecognizedEvent);
        }

        let policy_delta = self.policy.points_for(&event.event_type);
        let mut next = state.clone();
        next.policy_version = self.policy.version.clone();

        if event.event_type == EngagementEventType::EmailBounced {
            let transition = derive_status(
                &self.policy,
                state,
                &next,
                StatusTrigger::Event(&event.event_type),
            );
            next.status = transition.to;
            return ScoringOutcome {
                state: next,
                policy_delta,
                delta: 0,
                transition,
                effect: ScoringEffect::Bounced,
            };
        }

        next.score = self
            .policy
            .clamp_score(state.score.saturating_add(policy_delta));
        next.group = self.group_for(next.score);

        match event.event_type.counter() {
            Some(EngagementCounter::Opens) => next.opens = next.opens.saturating_add(1),
            Some(EngagementCounter::Clicks) => next.clicks = next.clicks.saturating_add(1),
            Some(EngagementCounter::Replies) => next.replies = next.replies.saturating_add(1),
            None => {}
        }

        // Late webhook deliveries must not move the staleness clock backwards.
        if state
            .last_engagement_at
            .map_or(true, |last| event.occurred_at > last)
        {
            next.last_engagement_at = Some(event.occurred_at);
        }

        let transition = derive_status(
            &self.policy,
            state,
            &next,
            StatusTrigger::Event(&event.event_type),
        );
        next.status = transition.to;

        ScoringOutcome {
            delta: next.score.saturating_sub(state.score),
            state: next,
            policy_delta,
            transition,
            effect: ScoringEffect::Scored,
        }
    }

    /// Explicit dashboard action such as "mark replied". Never touches the score or counters.
    pub fn apply_status_action(&self, state: &ScoringState, action: StatusAction) -> ScoringOutcome {
        if state.status.is_terminal() {
            return ScoringOutcome::unchanged(state, NoOpReason::TerminalProspect);
        }

        let transition = derive_status(&self.policy, state, state, StatusTrigger::Manual(action));
        if !transition.is_change() {
            return ScoringOutcome::unchanged(state, NoOpReason::StatusUnchanged);
        }

        let mut next = state.clone();
        next.status = transition.to;
        next.policy_version = self.policy.version.clone();

        ScoringOutcome {
            state: next,
            policy_delta: 0,
            delta: 0,
            transition,
            effect: ScoringEffect::StatusAction,
        }
    }

    pub fn view(&self, state: &ScoringState) -> ProspectScoreView {
        ProspectScoreView {
            prospect_id: state.prospect_id.clone(),
            score: state.score,
            engagement_group: state.group,
            group_label: self.group_label(state.group).to_string(),
            status: state.status,
            status_label: state.status.label().to_string(),
            opens: state.opens,
            clicks: state.clicks,
            replies: state.replies,
            last_engagement_at: state.last_engagement_at,
            current_stage: state.current_stage,
            policy_version: state.policy_version.clone(),
        }
    }
}
