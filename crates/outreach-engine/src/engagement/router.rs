use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decay::{CancellationToken, DecaySweepReport};
use super::domain::{EngagementEvent, EngagementEventType, EventId, ProspectId, ProspectScoreView};
use super::lifecycle::{StatusAction, StatusTransition};
use super::repository::{EngagementNotifier, EventLedger, ProspectRepository, RepositoryError};
use super::scoring::{ScoringEffect, ScoringEngine, ScoringOutcome};
use super::service::{EngagementService, EngagementServiceError, NewProspect};

type SharedService<R, L, N> = Arc<EngagementService<R, L, N>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProspectRequest {
    pub prospect_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_stage: u32,
}

/// Inbound event from the dashboard or an email provider webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEventRequest {
    pub id: String,
    #[serde(alias = "type")]
    pub event_type: EngagementEventType,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusActionRequest {
    pub action: StatusAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecaySweepRequest {
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringOutcomeView {
    #[serde(flatten)]
    pub prospect: ProspectScoreView,
    pub delta: i32,
    pub policy_delta: i32,
    pub transition: StatusTransition,
    pub effect: ScoringEffect,
    pub duplicate: bool,
}

impl ScoringOutcomeView {
    fn new(engine: &ScoringEngine, outcome: &ScoringOutcome, duplicate: bool) -> Self {
        Self {
            prospect: engine.view(&outcome.state),
            delta: outcome.delta,
            policy_delta: outcome.policy_delta,
            transition: outcome.transition,
            effect: outcome.effect,
            duplicate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecaySweepView {
    pub now: DateTime<Utc>,
    pub examined: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub cancelled: bool,
    pub decayed: Vec<ProspectScoreView>,
}

impl DecaySweepView {
    fn new(engine: &ScoringEngine, report: &DecaySweepReport) -> Self {
        Self {
            now: report.now,
            examined: report.examined,
            skipped: report.skipped,
            conflicts: report.conflicts,
            cancelled: report.cancelled,
            decayed: report
                .decayed
                .iter()
                .map(|(_, state)| engine.view(state))
                .collect(),
        }
    }
}

/// Router builder exposing prospect scoring, event ingestion, and the decay trigger.
pub fn engagement_router<R, L, N>(service: SharedService<R, L, N>) -> Router
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    Router::new()
        .route("/api/v1/prospects", post(create_handler::<R, L, N>))
        .route(
            "/api/v1/prospects/:prospect_id",
            get(prospect_handler::<R, L, N>),
        )
        .route(
            "/api/v1/prospects/:prospect_id/events",
            post(event_handler::<R, L, N>).get(ledger_handler::<R, L, N>),
        )
        .route(
            "/api/v1/prospects/:prospect_id/status",
            post(status_action_handler::<R, L, N>),
        )
        .route("/api/v1/decay/sweep", post(sweep_handler::<R, L, N>))
        .route("/api/v1/scoring/policy", get(policy_handler::<R, L, N>))
        .with_state(service)
}

fn error_response(error: EngagementServiceError) -> Response {
    let status = match &error {
        EngagementServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        EngagementServiceError::Repository(RepositoryError::Conflict)
        | EngagementServiceError::WriteContention { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn unprocessable(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

pub(crate) async fn create_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
    Json(request): Json<CreateProspectRequest>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    let prospect_id = request.prospect_id.trim();
    if prospect_id.is_empty() {
        return unprocessable("prospect_id must not be empty");
    }

    let prospect = NewProspect {
        prospect_id: ProspectId(prospect_id.to_string()),
        created_at: request.created_at.unwrap_or_else(Utc::now),
        current_stage: request.current_stage,
    };

    match service.create_prospect(prospect) {
        Ok(state) => (StatusCode::CREATED, Json(service.engine().view(&state))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn prospect_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
    Path(prospect_id): Path<String>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    match service.get(&ProspectId(prospect_id)) {
        Ok(state) => (StatusCode::OK, Json(service.engine().view(&state))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn event_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
    Path(prospect_id): Path<String>,
    Json(request): Json<IngestEventRequest>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    if request.id.trim().is_empty() {
        return unprocessable("event id must not be empty");
    }

    let event = EngagementEvent {
        id: EventId(request.id),
        prospect_id: ProspectId(prospect_id),
        event_type: request.event_type,
        occurred_at: request.occurred_at,
        description: request.description,
        metadata: request.metadata,
    };

    match service.record_event(event) {
        Ok(receipt) => {
            let view = ScoringOutcomeView::new(service.engine(), &receipt.outcome, receipt.duplicate);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn ledger_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
    Path(prospect_id): Path<String>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    match service.events(&ProspectId(prospect_id)) {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_action_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
    Path(prospect_id): Path<String>,
    Json(request): Json<StatusActionRequest>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    match service.apply_status_action(&ProspectId(prospect_id), request.action) {
        Ok(outcome) => {
            let view = ScoringOutcomeView::new(service.engine(), &outcome, false);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn sweep_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
    request: Option<Json<DecaySweepRequest>>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    let now = request
        .and_then(|Json(request)| request.now)
        .unwrap_or_else(Utc::now);

    match service.run_decay_sweep(now, &CancellationToken::new()) {
        Ok(report) => {
            let view = DecaySweepView::new(service.engine(), &report);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn policy_handler<R, L, N>(
    State(service): State<SharedService<R, L, N>>,
) -> Response
where
    R: ProspectRepository + 'static,
    L: EventLedger + 'static,
    N: EngagementNotifier + 'static,
{
    (StatusCode::OK, Json(service.engine().policy().clone())).into_response()
}
