use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::super::domain::{EngagementEventType, ProspectStatus};
use super::PolicyError;

/// One row of the ordered score → group table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupThreshold {
    pub group: u8,
    /// Inclusive lower bound.
    pub min_score: i32,
    /// Inclusive upper bound.
    pub max_score: i32,
    pub label: String,
    /// Furthest funnel status this group justifies on its own.
    pub status: ProspectStatus,
}

impl GroupThreshold {
    fn new(group: u8, score: i32, label: &str, status: ProspectStatus) -> Self {
        Self {
            group,
            min_score: score,
            max_score: score,
            label: label.to_string(),
            status,
        }
    }

    pub fn contains(&self, score: i32) -> bool {
        (self.min_score..=self.max_score).contains(&score)
    }
}

/// Versioned scoring rules shared by every caller that scores prospects.
///
/// Deserialization fills any missing field from [`ScoringPolicy::default`], so a tenant file only
/// needs to list what it overrides. `points` and `status_floors` merge entry by entry over the
/// defaults; set an entry to `0` (or a floor to `cold`) to neutralise it. Construct a
/// [`super::super::ScoringEngine`] to validate the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub version: String,
    #[serde(deserialize_with = "merge_points")]
    pub points: BTreeMap<EngagementEventType, i32>,
    /// Event types that carry an explicit status change, like a manual "mark contacted".
    #[serde(deserialize_with = "merge_status_floors")]
    pub status_floors: BTreeMap<EngagementEventType, ProspectStatus>,
    pub decay_after_days: i64,
    pub decay_amount: i32,
    pub min_score: i32,
    pub max_score: i32,
    pub groups: Vec<GroupThreshold>,
}

fn default_points() -> BTreeMap<EngagementEventType, i32> {
    BTreeMap::from([
        (EngagementEventType::EmailSent, 0),
        (EngagementEventType::EmailOpened, 1),
        (EngagementEventType::EmailClicked, 1),
        (EngagementEventType::EmailReplied, 3),
        (EngagementEventType::EmailBounced, 0),
        (EngagementEventType::CallMade, 1),
        (EngagementEventType::MeetingScheduled, 2),
        (EngagementEventType::NoteAdded, 0),
    ])
}

fn default_status_floors() -> BTreeMap<EngagementEventType, ProspectStatus> {
    BTreeMap::from([
        (EngagementEventType::EmailSent, ProspectStatus::Contacted),
        (EngagementEventType::EmailReplied, ProspectStatus::Replied),
    ])
}

fn merge_points<'de, D>(deserializer: D) -> Result<BTreeMap<EngagementEventType, i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<EngagementEventType, i32>::deserialize(deserializer)?;
    let mut points = default_points();
    points.extend(overrides);
    Ok(points)
}

fn merge_status_floors<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<EngagementEventType, ProspectStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<EngagementEventType, ProspectStatus>::deserialize(deserializer)?;
    let mut floors = default_status_floors();
    floors.extend(overrides);
    Ok(floors)
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            version: "discrete-additive-v1".to_string(),
            points: default_points(),
            status_floors: default_status_floors(),
            decay_after_days: 10,
            decay_amount: 1,
            min_score: 0,
            max_score: 6,
            groups: vec![
                GroupThreshold::new(0, 0, "Cold", ProspectStatus::Cold),
                GroupThreshold::new(1, 1, "Aware", ProspectStatus::Contacted),
                GroupThreshold::new(2, 2, "Warming", ProspectStatus::Contacted),
                GroupThreshold::new(3, 3, "Engaged", ProspectStatus::Replied),
                GroupThreshold::new(4, 4, "Interested", ProspectStatus::Interested),
                GroupThreshold::new(5, 5, "Hot Lead", ProspectStatus::Qualified),
                GroupThreshold::new(6, 6, "Handoff Ready", ProspectStatus::Handoff),
            ],
        }
    }
}

impl ScoringPolicy {
    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(raw).map_err(PolicyError::Parse)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Score delta for an event type. Unrecognized or unlisted types are neutral.
    pub fn points_for(&self, event_type: &EngagementEventType) -> i32 {
        if !event_type.is_recognized() {
            return 0;
        }
        self.points.get(event_type).copied().unwrap_or(0)
    }

    pub fn status_floor_for(&self, event_type: &EngagementEventType) -> Option<ProspectStatus> {
        self.status_floors.get(event_type).copied()
    }

    /// First threshold containing `score`, in table order.
    pub fn threshold_for(&self, score: i32) -> Option<&GroupThreshold> {
        self.groups.iter().find(|threshold| threshold.contains(score))
    }

    pub fn clamp_score(&self, raw: i32) -> i32 {
        raw.clamp(self.min_score, self.max_score)
    }

    pub fn max_group(&self) -> Option<u8> {
        self.groups.iter().map(|threshold| threshold.group).max()
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        super::thresholds::validate(self)
    }
}
