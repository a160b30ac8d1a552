//! Stripe webhook endpoint.
//!
//! The body must reach signature verification byte-for-byte, so it is taken
//! as raw `Bytes` rather than parsed JSON.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap, response::IntoResponse};
use serde_json::json;
use tracing::instrument;

use crate::error::Result;
use crate::services::stripe::StripeError;
use crate::services::webhook::{WebhookOutcome, WebhookService};
use crate::state::AppState;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /stripe
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| StripeError::InvalidSignature("Missing signature header".to_string()))?;

    let event = state.stripe().construct_event(signature, &body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook delivery");
        e
    })?;

    let outcome = WebhookService::new(state.pool(), state.stripe())
        .handle(&event)
        .await?;

    Ok(Json(match outcome {
        WebhookOutcome::Processed => json!({ "received": true }),
        WebhookOutcome::Duplicate => json!({ "received": true, "duplicate": true }),
    }))
}
