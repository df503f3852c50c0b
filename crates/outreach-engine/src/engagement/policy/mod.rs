mod config;
mod thresholds;

pub use config::{GroupThreshold, ScoringPolicy};

use super::domain::ProspectStatus;

/// Fatal policy problems, raised when a policy is loaded or an engine is built from it.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("unable to read scoring policy {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scoring policy is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("scoring policy must carry a version")]
    MissingVersion,
    #[error("min_score {min_score} exceeds max_score {max_score}")]
    InvertedBounds { min_score: i32, max_score: i32 },
    #[error("decay_after_days must be positive, got {0}")]
    InvalidDecayWindow(i64),
    #[error("decay_amount must be positive, got {0}")]
    InvalidDecayAmount(i32),
    #[error("event type {event_type} cannot force status {status:?}")]
    InvalidStatusFloor {
        event_type: String,
        status: ProspectStatus,
    },
    #[error("group threshold table is empty")]
    EmptyThresholds,
    #[error("group {group} has min_score above max_score")]
    InvertedThreshold { group: u8 },
    #[error("group {group} overlaps an earlier threshold at score {score}")]
    OverlappingThresholds { group: u8, score: i32 },
    #[error("scores {from}..={to} are not covered by any group")]
    UncoveredScores { from: i64, to: i64 },
    #[error("group thresholds reach score {score}, outside min_score..=max_score")]
    ThresholdOutOfBounds { score: i32 },
    #[error("group {group} is not numbered above the preceding group")]
    UnorderedGroups { group: u8 },
    #[error("group {group} justifies an earlier status than the preceding group")]
    RegressingGroupStatus { group: u8 },
    #[error("group {group} cannot map to the terminal bounced status")]
    TerminalGroupStatus { group: u8 },
}
