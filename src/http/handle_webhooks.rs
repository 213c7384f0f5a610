use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::errors::{CheckError, RuleError};
use crate::farcaster::Cast;
use crate::http::context::WebContext;
use crate::intake::{IntakeOutcome, ModerationEvent};
use crate::moderation::ModerationOptions;

/// Generic message for failures the caller cannot act on.
const TRY_AGAIN_LATER: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Deserialize)]
pub struct CastWebhookPayload {
    pub channel: String,
    pub cast: Cast,
}

#[derive(Debug, Deserialize)]
pub struct MemberWebhookPayload {
    pub channel: String,
    pub fid: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub simulate: bool,
}

/// Handler for new-cast events.
///
/// POST /webhooks/casts
pub async fn handle_cast_webhook(
    State(context): State<WebContext>,
    Query(query): Query<WebhookQuery>,
    Json(payload): Json<CastWebhookPayload>,
) -> Response {
    info!(
        channel = %payload.channel,
        cast = %payload.cast.hash,
        simulate = query.simulate,
        "Received cast webhook"
    );

    let event = ModerationEvent::CastCreated {
        channel_id: payload.channel,
        cast: payload.cast,
    };
    let options = ModerationOptions {
        simulation: query.simulate,
    };

    match context.intake.handle_event(event, options).await {
        Ok(outcome) => intake_response(outcome),
        Err(e) => error_response(e),
    }
}

/// Handler for channel join requests.
///
/// POST /webhooks/members
pub async fn handle_member_webhook(
    State(context): State<WebContext>,
    Query(query): Query<WebhookQuery>,
    Json(payload): Json<MemberWebhookPayload>,
) -> Response {
    info!(
        channel = %payload.channel,
        fid = payload.fid,
        simulate = query.simulate,
        "Received member webhook"
    );

    let event = ModerationEvent::MemberRequest {
        channel_id: payload.channel,
        fid: payload.fid,
    };
    let options = ModerationOptions {
        simulation: query.simulate,
    };

    match context.intake.handle_event(event, options).await {
        Ok(outcome) => intake_response(outcome),
        Err(e) => error_response(e),
    }
}

/// Liveness probe.
///
/// GET /health
pub async fn handle_health(State(context): State<WebContext>) -> Response {
    match context.storage.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))).into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy"})),
            )
                .into_response()
        }
    }
}

fn intake_response(outcome: IntakeOutcome) -> Response {
    match outcome {
        IntakeOutcome::Processed(outcome) => (
            StatusCode::OK,
            Json(json!({
                "status": "processed",
                "approved": outcome.approved,
                "explanation": outcome.explanation,
                "logs": outcome.logs,
            })),
        )
            .into_response(),
        IntakeOutcome::Duplicate => (
            StatusCode::OK,
            Json(json!({"status": "duplicate"})),
        )
            .into_response(),
        IntakeOutcome::ChannelInactive => (
            StatusCode::OK,
            Json(json!({"status": "inactive"})),
        )
            .into_response(),
        IntakeOutcome::ChannelNotFound(channel_id) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Channel not found",
                "message": format!("No moderated channel named {}", channel_id)
            })),
        )
            .into_response(),
    }
}

/// Map engine errors per the error taxonomy: transient check states get a
/// 503 so the upstream redelivers, configuration errors and everything
/// else surface as a generic 500.
fn error_response(e: anyhow::Error) -> Response {
    if let Some(check_err) = e.downcast_ref::<CheckError>() {
        if check_err.is_transient() {
            warn!(error = %check_err, "Transient check state, requesting redelivery");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Result not ready",
                    "message": "Evaluation is still in progress. Please try again later."
                })),
            )
                .into_response();
        }
    }

    if let Some(rule_err) = e.downcast_ref::<RuleError>() {
        error!(error = %rule_err, "Channel configuration is invalid");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Invalid channel configuration",
                "message": TRY_AGAIN_LATER
            })),
        )
            .into_response();
    }

    error!(error = %e, "Moderation evaluation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal error",
            "message": TRY_AGAIN_LATER
        })),
    )
        .into_response()
}
