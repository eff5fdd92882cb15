use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::ingest::adapters::{AccessibilityPayload, IntoSignal, NotificationPayload, SmsPayload};
use crate::pipeline::{Pipeline, ProcessOutcome};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Signal intake routes plus `/health`. `/metrics` is merged in by the binary.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/signals/notification", post(notification))
        .route("/v1/signals/accessibility", post(accessibility))
        .route("/v1/signals/sms", post(sms))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct OutcomeResp {
    pub outcome: ProcessOutcome,
}

type Reply = (StatusCode, Json<OutcomeResp>);

fn reply(outcome: ProcessOutcome) -> Reply {
    let status = match outcome {
        ProcessOutcome::Malformed => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    (status, Json(OutcomeResp { outcome }))
}

fn handle(state: &AppState, payload: impl IntoSignal) -> Reply {
    let channel = payload.channel();
    let outcome = state.pipeline.ingest(payload);
    tracing::debug!(target: "api", %channel, outcome = outcome.as_str(), "signal handled");
    reply(outcome)
}

async fn notification(
    State(state): State<AppState>,
    Json(body): Json<NotificationPayload>,
) -> Reply {
    handle(&state, body)
}

async fn accessibility(
    State(state): State<AppState>,
    Json(body): Json<AccessibilityPayload>,
) -> Reply {
    handle(&state, body)
}

async fn sms(State(state): State<AppState>, Json(body): Json<SmsPayload>) -> Reply {
    handle(&state, body)
}
