use crate::engagement::domain::{EngagementEventType, ProspectStatus};
use crate::engagement::policy::{GroupThreshold, PolicyError, ScoringPolicy};
use crate::engagement::ScoringEngine;

fn threshold(group: u8, min: i32, max: i32, status: ProspectStatus) -> GroupThreshold {
    GroupThreshold {
        group,
        min_score: min,
        max_score: max,
        label: format!("group {group}"),
        status,
    }
}

fn banded_policy(groups: Vec<GroupThreshold>) -> ScoringPolicy {
    ScoringPolicy {
        groups,
        ..ScoringPolicy::default()
    }
}

#[test]
fn default_policy_matches_observed_rules() {
    let policy = ScoringPolicy::default();
    policy.validate().expect("default policy is valid");

    assert_eq!(policy.points_for(&EngagementEventType::EmailOpened), 1);
    assert_eq!(policy.points_for(&EngagementEventType::EmailClicked), 1);
    assert_eq!(policy.points_for(&EngagementEventType::EmailReplied), 3);
    assert_eq!(policy.decay_after_days, 10);
    assert_eq!(policy.decay_amount, 1);
    assert_eq!((policy.min_score, policy.max_score), (0, 6));
    assert_eq!(policy.max_group(), Some(6));
    for score in 0..=6 {
        assert_eq!(
            policy.threshold_for(score).map(|threshold| i32::from(threshold.group)),
            Some(score)
        );
    }
}

#[test]
fn wider_bands_are_accepted() {
    let policy = banded_policy(vec![
        threshold(0, 0, 1, ProspectStatus::Cold),
        threshold(1, 2, 4, ProspectStatus::Contacted),
        threshold(2, 5, 6, ProspectStatus::Handoff),
    ]);
    let engine = ScoringEngine::new(policy).expect("contiguous bands are valid");

    assert_eq!(engine.group_for(0), 0);
    assert_eq!(engine.group_for(3), 1);
    assert_eq!(engine.group_for(6), 2);
    assert_eq!(engine.group_label(1), "group 1");
}

#[test]
fn rejects_overlapping_thresholds() {
    let policy = banded_policy(vec![
        threshold(0, 0, 3, ProspectStatus::Cold),
        threshold(1, 3, 6, ProspectStatus::Contacted),
    ]);

    assert!(matches!(
        ScoringEngine::new(policy),
        Err(PolicyError::OverlappingThresholds { group: 1, score: 3 })
    ));
}

#[test]
fn rejects_gaps_between_thresholds() {
    let policy = banded_policy(vec![
        threshold(0, 0, 2, ProspectStatus::Cold),
        threshold(1, 4, 6, ProspectStatus::Contacted),
    ]);

    assert!(matches!(
        policy.validate(),
        Err(PolicyError::UncoveredScores { from: 3, to: 3 })
    ));
}

#[test]
fn rejects_tables_that_stop_short_of_max_score() {
    let policy = banded_policy(vec![
        threshold(0, 0, 2, ProspectStatus::Cold),
        threshold(1, 3, 5, ProspectStatus::Contacted),
    ]);

    assert!(matches!(
        policy.validate(),
        Err(PolicyError::UncoveredScores { from: 6, to: 6 })
    ));
}

#[test]
fn rejects_tables_that_run_past_the_bounds() {
    let policy = banded_policy(vec![
        threshold(0, -1, 2, ProspectStatus::Cold),
        threshold(1, 3, 6, ProspectStatus::Contacted),
    ]);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::ThresholdOutOfBounds { score: -1 })
    ));

    let policy = banded_policy(vec![
        threshold(0, 0, 2, ProspectStatus::Cold),
        threshold(1, 3, 9, ProspectStatus::Contacted),
    ]);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::ThresholdOutOfBounds { score: 9 })
    ));
}

#[test]
fn rejects_unordered_or_regressing_groups() {
    let policy = banded_policy(vec![
        threshold(1, 0, 2, ProspectStatus::Cold),
        threshold(0, 3, 6, ProspectStatus::Contacted),
    ]);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::UnorderedGroups { group: 0 })
    ));

    let policy = banded_policy(vec![
        threshold(0, 0, 2, ProspectStatus::Replied),
        threshold(1, 3, 6, ProspectStatus::Contacted),
    ]);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::RegressingGroupStatus { group: 1 })
    ));
}

#[test]
fn rejects_bad_bounds_and_decay_settings() {
    let inverted = ScoringPolicy {
        min_score: 7,
        ..ScoringPolicy::default()
    };
    assert!(matches!(
        inverted.validate(),
        Err(PolicyError::InvertedBounds { .. })
    ));

    let no_window = ScoringPolicy {
        decay_after_days: 0,
        ..ScoringPolicy::default()
    };
    assert!(matches!(
        no_window.validate(),
        Err(PolicyError::InvalidDecayWindow(0))
    ));

    let no_decay = ScoringPolicy {
        decay_amount: 0,
        ..ScoringPolicy::default()
    };
    assert!(matches!(
        no_decay.validate(),
        Err(PolicyError::InvalidDecayAmount(0))
    ));
}

#[test]
fn rejects_terminal_statuses_in_tables_and_floors() {
    let policy = banded_policy(vec![
        threshold(0, 0, 5, ProspectStatus::Cold),
        threshold(1, 6, 6, ProspectStatus::Bounced),
    ]);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::TerminalGroupStatus { group: 1 })
    ));

    let mut policy = ScoringPolicy::default();
    policy
        .status_floors
        .insert(EngagementEventType::MeetingScheduled, ProspectStatus::Handoff);
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::InvalidStatusFloor { .. })
    ));
}

#[test]
fn partial_json_inherits_defaults() {
    let policy = ScoringPolicy::from_json(
        r#"{
            "version": "tenant-42-v3",
            "points": { "email_opened": 2, "webinar_attended": 5 },
            "decay_after_days": 14
        }"#,
    )
    .expect("policy parses");

    assert_eq!(policy.version, "tenant-42-v3");
    assert_eq!(policy.points_for(&EngagementEventType::EmailOpened), 2);
    assert_eq!(
        policy.points_for(&EngagementEventType::parse("webinar_attended")),
        0,
        "unrecognized types stay neutral even when listed"
    );
    assert_eq!(policy.points_for(&EngagementEventType::EmailReplied), 3);
    assert_eq!(policy.points_for(&EngagementEventType::EmailClicked), 1);
    assert_eq!(policy.status_floors, ScoringPolicy::default().status_floors);
    assert_eq!(policy.decay_after_days, 14);
    assert_eq!(policy.groups, ScoringPolicy::default().groups);
    policy.validate().expect("merged policy is valid");
}

#[test]
fn listed_entries_override_single_defaults() {
    let policy = ScoringPolicy::from_json(
        r#"{
            "points": { "email_replied": 0 },
            "status_floors": { "email_sent": "cold" }
        }"#,
    )
    .expect("policy parses");

    assert_eq!(policy.points_for(&EngagementEventType::EmailReplied), 0);
    assert_eq!(policy.points_for(&EngagementEventType::MeetingScheduled), 2);
    assert_eq!(
        policy.status_floors.get(&EngagementEventType::EmailSent),
        Some(&ProspectStatus::Cold)
    );
    assert_eq!(
        policy.status_floors.get(&EngagementEventType::EmailReplied),
        Some(&ProspectStatus::Replied)
    );
    ScoringEngine::new(policy).expect("merged policy is valid");
}

#[test]
fn tables_reaching_the_integer_floor_validate() {
    let policy = ScoringPolicy {
        min_score: i32::MIN,
        groups: vec![threshold(0, i32::MIN, 6, ProspectStatus::Cold)],
        ..ScoringPolicy::default()
    };
    ScoringEngine::new(policy).expect("single band over the full lower range");

    let policy = ScoringPolicy {
        min_score: i32::MIN,
        max_score: i32::MAX,
        groups: vec![
            threshold(0, i32::MIN, 0, ProspectStatus::Cold),
            threshold(1, 1, i32::MAX, ProspectStatus::Contacted),
        ],
        ..ScoringPolicy::default()
    };
    ScoringEngine::new(policy).expect("two bands over the whole i32 range");
}

#[test]
fn gaps_at_the_integer_floor_are_reported() {
    let policy = ScoringPolicy {
        min_score: i32::MIN,
        groups: vec![threshold(0, i32::MIN + 1, 6, ProspectStatus::Cold)],
        ..ScoringPolicy::default()
    };

    assert!(matches!(
        policy.validate(),
        Err(PolicyError::UncoveredScores { from, to })
            if from == i64::from(i32::MIN) && to == from
    ));

    let policy = ScoringPolicy {
        min_score: i32::MIN,
        max_score: i32::MAX,
        groups: vec![threshold(0, i32::MIN, i32::MAX - 1, ProspectStatus::Cold)],
        ..ScoringPolicy::default()
    };
    assert!(matches!(
        policy.validate(),
        Err(PolicyError::UncoveredScores { from, to })
            if from == i64::from(i32::MAX) && to == from
    ));
}

#[test]
fn missing_policy_file_reports_path() {
    match ScoringPolicy::from_path("/nonexistent/outreach/policy.json") {
        Err(PolicyError::Io { path, .. }) => assert!(path.contains("policy.json")),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(
        ScoringPolicy::from_json("{ not json"),
        Err(PolicyError::Parse(_))
    ));
}
