//! Prospect engagement scoring, lifecycle, and decay.
//!
//! [`ScoringEngine`] holds a validated [`ScoringPolicy`] and exposes pure transitions: applying an
//! event, applying a manual status action, and applying one decay step. [`lifecycle`] is the only
//! place funnel status is decided. [`EngagementService`] wraps the engine in the
//! read-compute-write cycle against the [`ProspectRepository`] and [`EventLedger`] seams.

pub mod decay;
pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use decay::{days_between, decay_sweep, CancellationToken, DecayEligibility, DecaySweepReport};
pub use domain::{
    EngagementCounter, EngagementEvent, EngagementEventType, EventId, ProspectId,
    ProspectScoreView, ProspectStatus, ScoringState,
};
pub use lifecycle::{derive_status, StatusAction, StatusTransition, StatusTrigger, TransitionRule};
pub use memory::{InMemoryEventLedger, InMemoryNotifier, InMemoryProspectRepository};
pub use policy::{GroupThreshold, PolicyError, ScoringPolicy};
pub use repository::{
    EngagementNotification, EngagementNotifier, EventLedger, LedgerAppend, LedgerError,
    NotifyError, ProspectRepository, RepositoryError,
};
pub use router::engagement_router;
pub use scoring::{NoOpReason, ScoringEffect, ScoringEngine, ScoringOutcome};
pub use service::{EngagementService, EngagementServiceError, EventReceipt, NewProspect};
