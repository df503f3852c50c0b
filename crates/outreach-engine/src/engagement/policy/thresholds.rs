use super::super::domain::ProspectStatus;
use super::config::ScoringPolicy;
use super::PolicyError;

/// Load-time checks. A policy that passes can score any event without guessing a group.
pub(crate) fn validate(policy: &ScoringPolicy) -> Result<(), PolicyError> {
    if policy.version.trim().is_empty() {
        return Err(PolicyError::MissingVersion);
    }

    if policy.min_score > policy.max_score {
        return Err(PolicyError::InvertedBounds {
            min_score: policy.min_score,
            max_score: policy.max_score,
        });
    }

    if policy.decay_after_days <= 0 {
        return Err(PolicyError::InvalidDecayWindow(policy.decay_after_days));
    }

    if policy.decay_amount <= 0 {
        return Err(PolicyError::InvalidDecayAmount(policy.decay_amount));
    }

    for (event_type, status) in &policy.status_floors {
        if matches!(status, ProspectStatus::Bounced | ProspectStatus::Handoff) {
            return Err(PolicyError::InvalidStatusFloor {
                event_type: event_type.to_string(),
                status: *status,
            });
        }
    }

    validate_groups(policy)
}

// Coverage bookkeeping runs in i64 so tables touching the i32 extremes cannot overflow.
fn validate_groups(policy: &ScoringPolicy) -> Result<(), PolicyError> {
    let Some(first) = policy.groups.first() else {
        return Err(PolicyError::EmptyThresholds);
    };

    let min_score = i64::from(policy.min_score);
    let max_score = i64::from(policy.max_score);

    if first.min_score < policy.min_score {
        return Err(PolicyError::ThresholdOutOfBounds {
            score: first.min_score,
        });
    }
    if first.min_score > policy.min_score {
        return Err(PolicyError::UncoveredScores {
            from: min_score,
            to: i64::from(first.min_score) - 1,
        });
    }

    let mut covered_through = min_score - 1;
    let mut previous: Option<(u8, ProspectStatus)> = None;

    for threshold in &policy.groups {
        let lower = i64::from(threshold.min_score);

        if threshold.min_score > threshold.max_score {
            return Err(PolicyError::InvertedThreshold {
                group: threshold.group,
            });
        }

        if threshold.status.is_terminal() {
            return Err(PolicyError::TerminalGroupStatus {
                group: threshold.group,
            });
        }

        if lower <= covered_through {
            return Err(PolicyError::OverlappingThresholds {
                group: threshold.group,
                score: threshold.min_score,
            });
        }

        if lower > covered_through + 1 {
            return Err(PolicyError::UncoveredScores {
                from: covered_through + 1,
                to: lower - 1,
            });
        }

        if let Some((previous_group, previous_status)) = previous {
            if threshold.group <= previous_group {
                return Err(PolicyError::UnorderedGroups {
                    group: threshold.group,
                });
            }
            if previous_status.furthest(threshold.status) != threshold.status {
                return Err(PolicyError::RegressingGroupStatus {
                    group: threshold.group,
                });
            }
        }

        covered_through = i64::from(threshold.max_score);
        previous = Some((threshold.group, threshold.status));
    }

    if covered_through > max_score {
        return Err(PolicyError::ThresholdOutOfBounds {
            score: policy
                .groups
                .last()
                .map_or(policy.max_score, |threshold| threshold.max_score),
        });
    }
    if covered_through < max_score {
        return Err(PolicyError::UncoveredScores {
            from: covered_through + 1,
            to: max_score,
        });
    }

    Ok(())
}
