use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier wrapper for prospects; stable for the prospect's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProspectId(pub String);

impl fmt::Display for ProspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for engagement events. Upstream producers may redeliver the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interaction vocabulary shared with the email provider webhooks and the dashboard.
///
/// The wire names are fixed. Anything else is carried as [`EngagementEventType::Unrecognized`]
/// so newer producers never break ingestion; such events are recorded but scored as neutral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngagementEventType {
    EmailSent,
    EmailOpened,
    EmailClicked,
    EmailReplied,
    EmailBounced,
    CallMade,
    MeetingScheduled,
    NoteAdded,
    Unrecognized(String),
}

impl EngagementEventType {
    pub const KNOWN: [Self; 8] = [
        Self::EmailSent,
        Self::EmailOpened,
        Self::EmailClicked,
        Self::EmailReplied,
        Self::EmailBounced,
        Self::CallMade,
        Self::MeetingScheduled,
        Self::NoteAdded,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "email_sent" => Self::EmailSent,
            "email_opened" => Self::EmailOpened,
            "email_clicked" => Self::EmailClicked,
            "email_replied" => Self::EmailReplied,
            "email_bounced" => Self::EmailBounced,
            "call_made" => Self::CallMade,
            "meeting_scheduled" => Self::MeetingScheduled,
            "note_added" => Self::NoteAdded,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailSent => "email_sent",
            Self::EmailOpened => "email_opened",
            Self::EmailClicked => "email_clicked",
            Self::EmailReplied => "email_replied",
            Self::EmailBounced => "email_bounced",
            Self::CallMade => "call_made",
            Self::MeetingScheduled => "meeting_scheduled",
            Self::NoteAdded => "note_added",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// Raw interaction counter bumped by this event type, if any.
    pub fn counter(&self) -> Option<EngagementCounter> {
        match self {
            Self::EmailOpened => Some(EngagementCounter::Opens),
            Self::EmailClicked => Some(EngagementCounter::Clicks),
            Self::EmailReplied => Some(EngagementCounter::Replies),
            _ => None,
        }
    }
}

impl fmt::Display for EngagementEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EngagementEventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EngagementEventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementCounter {
    Opens,
    Clicks,
    Replies,
}

/// Funnel position of a prospect.
///
/// `Cold` through `Handoff` form the forward chain. `Bounced` sits outside the chain and absorbs
/// every later transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    Cold,
    Contacted,
    Replied,
    Interested,
    Qualified,
    Handoff,
    Bounced,
}

impl ProspectStatus {
    pub const fn forward_chain() -> [Self; 6] {
        [
            Self::Cold,
            Self::Contacted,
            Self::Replied,
            Self::Interested,
            Self::Qualified,
            Self::Handoff,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cold => "Cold",
            Self::Contacted => "Contacted",
            Self::Replied => "Replied",
            Self::Interested => "Interested",
            Self::Qualified => "Qualified",
            Self::Handoff => "Handoff",
            Self::Bounced => "Bounced",
        }
    }

    /// Position on the forward chain; `None` for `Bounced`.
    pub const fn chain_rank(self) -> Option<u8> {
        match self {
            Self::Cold => Some(0),
            Self::Contacted => Some(1),
            Self::Replied => Some(2),
            Self::Interested => Some(3),
            Self::Qualified => Some(4),
            Self::Handoff => Some(5),
            Self::Bounced => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Bounced)
    }

    /// Statuses the decay sweep leaves alone.
    pub const fn is_decay_exempt(self) -> bool {
        matches!(self, Self::Bounced | Self::Handoff)
    }

    /// The further of two chain statuses. `Bounced` wins over everything.
    pub fn furthest(self, other: Self) -> Self {
        match (self.chain_rank(), other.chain_rank()) {
            (None, _) => self,
            (_, None) => other,
            (Some(a), Some(b)) if b > a => other,
            _ => self,
        }
    }
}

/// Immutable record of a prospect interaction, as appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub id: EventId,
    pub prospect_id: ProspectId,
    #[serde(rename = "type", alias = "event_type")]
    pub event_type: EngagementEventType,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EngagementEvent {
    pub fn new(
        id: impl Into<String>,
        prospect_id: ProspectId,
        event_type: EngagementEventType,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId(id.into()),
            prospect_id,
            event_type,
            occurred_at,
            description: String::new(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// The slice of a prospect record owned by the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringState {
    pub prospect_id: ProspectId,
    pub score: i32,
    pub group: u8,
    pub status: ProspectStatus,
    pub opens: u32,
    pub clicks: u32,
    pub replies: u32,
    pub last_engagement_at: Option<DateTime<Utc>>,
    /// Most recent applied decay step; anchors sweep idempotency.
    pub last_decay_at: Option<DateTime<Utc>>,
    /// Outbound sequence position. Advanced by the sequencer, carried untouched here.
    pub current_stage: u32,
    pub created_at: DateTime<Utc>,
    pub policy_version: String,
    /// Write version used for compare-and-swap persistence.
    pub version: u64,
}

/// Persisted shape read by the dashboard and list filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectScoreView {
    pub prospect_id: ProspectId,
    pub score: i32,
    pub engagement_group: u8,
    pub group_label: String,
    pub status: ProspectStatus,
    pub status_label: String,
    pub opens: u32,
    pub clicks: u32,
    pub replies: u32,
    pub last_engagement_at: Option<DateTime<Utc>>,
    pub current_stage: u32,
    pub policy_version: String,
}
