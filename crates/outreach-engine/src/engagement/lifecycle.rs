//! Funnel status derivation.
//!
//! Every status change in the crate is decided here. Rules apply in a fixed order:
//!
//! 1. a bounce (event or manual) moves the prospect to `bounced`, overriding everything else;
//! 2. reaching the policy's highest group moves the prospect to `handoff`;
//! 3. a decay step that bottoms the score out returns the prospect to `cold`;
//! 4. otherwise the status only moves forward, as far as the group justifies, or further when the
//!    trigger itself carries an explicit status (manual actions, configured event floors).
//!
//! A prospect that is already `bounced` never transitions again.

use serde::{Deserialize, Serialize};

use super::domain::{EngagementEventType, ProspectStatus, ScoringState};
use super::policy::ScoringPolicy;

/// What caused the state change being evaluated.
#[derive(Debug, Clone, Copy)]
pub enum StatusTrigger<'a> {
    Event(&'a EngagementEventType),
    Decay,
    Manual(StatusAction),
}

/// Explicit status actions taken from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    MarkContacted,
    MarkReplied,
    MarkInterested,
    MarkQualified,
    MarkHandoff,
    MarkBounced,
}

impl StatusAction {
    pub const fn target(self) -> ProspectStatus {
        match self {
            Self::MarkContacted => ProspectStatus::Contacted,
            Self::MarkReplied => ProspectStatus::Replied,
            Self::MarkInterested => ProspectStatus::Interested,
            Self::MarkQualified => ProspectStatus::Qualified,
            Self::MarkHandoff => ProspectStatus::Handoff,
            Self::MarkBounced => ProspectStatus::Bounced,
        }
    }
}

/// Which lifecycle rule produced a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRule {
    Bounce,
    Handoff,
    DecayReset,
    Advance,
    Manual,
    Unchanged,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ProspectStatus,
    pub to: ProspectStatus,
    pub rule: TransitionRule,
}

impl StatusTransition {
    pub fn unchanged(status: ProspectStatus) -> Self {
        let rule = if status.is_terminal() {
            TransitionRule::Terminal
        } else {
            TransitionRule::Unchanged
        };
        Self {
            from: status,
            to: status,
            rule,
        }
    }

    pub fn is_change(&self) -> bool {
        self.from != self.to
    }

    fn between(from: ProspectStatus, to: ProspectStatus, rule: TransitionRule) -> Self {
        if from == to {
            Self::unchanged(from)
        } else {
            Self { from, to, rule }
        }
    }
}

/// Derive the status for `next`, the post-scoring state reached from `prior`.
pub fn derive_status(
    policy: &ScoringPolicy,
    prior: &ScoringState,
    next: &ScoringState,
    trigger: StatusTrigger<'_>,
) -> StatusTransition {
    let from = prior.status;
    if from.is_terminal() {
        return StatusTransition::unchanged(from);
    }

    let bounced = matches!(
        trigger,
        StatusTrigger::Event(EngagementEventType::EmailBounced)
            | StatusTrigger::Manual(StatusAction::MarkBounced)
    );
    if bounced {
        return StatusTransition::between(from, ProspectStatus::Bounced, TransitionRule::Bounce);
    }

    if policy.max_group() == Some(next.group) {
        return StatusTransition::between(from, ProspectStatus::Handoff, TransitionRule::Handoff);
    }

    if matches!(trigger, StatusTrigger::Decay) && next.score <= policy.min_score {
        return StatusTransition::between(from, ProspectStatus::Cold, TransitionRule::DecayReset);
    }

    let justified = policy
        .groups
        .iter()
        .find(|threshold| threshold.group == next.group)
        .map(|threshold| threshold.status)
        .unwrap_or(ProspectStatus::Cold);
    let by_group = from.furthest(justified);

    let (explicit, rule) = match trigger {
        StatusTrigger::Event(event_type) => (
            policy.status_floor_for(event_type),
            TransitionRule::Advance,
        ),
        StatusTrigger::Manual(action) => (Some(action.target()), TransitionRule::Manual),
        StatusTrigger::Decay => (None, TransitionRule::Advance),
    };

    match explicit {
        Some(status) if by_group.furthest(status) != by_group => {
            StatusTransition::between(from, status, rule)
        }
        _ => StatusTransition::between(from, by_group, TransitionRule::Advance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::engagement::domain::ProspectId;

    fn state(score: i32, group: u8, status: ProspectStatus) -> ScoringState {
        ScoringState {
            prospect_id: ProspectId("p-1".to_string()),
            score,
            group,
            status,
            opens: 0,
            clicks: 0,
            replies: 0,
            last_engagement_at: None,
            last_decay_at: None,
            current_stage: 0,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
            policy_version: "test".to_string(),
            version: 0,
        }
    }

    #[test]
    fn status_never_regresses_on_live_events() {
        let policy = ScoringPolicy::default();
        let prior = state(1, 1, ProspectStatus::Interested);
        let next = state(2, 2, ProspectStatus::Interested);

        let transition = derive_status(
            &policy,
            &prior,
            &next,
            StatusTrigger::Event(&EngagementEventType::EmailOpened),
        );

        assert_eq!(transition.to, ProspectStatus::Interested);
        assert!(!transition.is_change());
    }

    #[test]
    fn manual_action_may_run_ahead_of_group() {
        let policy = ScoringPolicy::default();
        let prior = state(0, 0, ProspectStatus::Cold);

        let transition = derive_status(
            &policy,
            &prior,
            &prior,
            StatusTrigger::Manual(StatusAction::MarkReplied),
        );

        assert_eq!(transition.to, ProspectStatus::Replied);
        assert_eq!(transition.rule, TransitionRule::Manual);
    }

    #[test]
    fn backwards_manual_action_is_unchanged() {
        let policy = ScoringPolicy::default();
        let prior = state(4, 4, ProspectStatus::Interested);

        let transition = derive_status(
            &policy,
            &prior,
            &prior,
            StatusTrigger::Manual(StatusAction::MarkContacted),
        );

        assert_eq!(transition, StatusTransition::unchanged(ProspectStatus::Interested));
    }

    #[test]
    fn decay_above_floor_keeps_status() {
        let policy = ScoringPolicy::default();
        let prior = state(3, 3, ProspectStatus::Replied);
        let next = state(2, 2, ProspectStatus::Replied);

        let transition = derive_status(&policy, &prior, &next, StatusTrigger::Decay);

        assert_eq!(transition.to, ProspectStatus::Replied);
    }
}
