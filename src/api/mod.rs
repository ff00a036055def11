// HTTP routes: health, metrics and the chat webhook.

pub mod webhook;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::bot::Bot;
use crate::messenger::MessageSender;
use crate::metrics;
use webhook::{verify_signature, WebhookEvent, WebhookPayload, SIGNATURE_HEADER};

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<Bot>,
    pub messenger: Arc<dyn MessageSender>,
    /// Webhook signing key. Without it signatures are not checked.
    pub channel_secret: Option<String>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/callback", post(callback))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "respawn-bot" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Webhook ───────────────────────────────────────────────────────────

async fn callback(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    if let Some(secret) = &state.channel_secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        let valid = signature.is_some_and(|sig| verify_signature(secret, &body, sig));
        if !valid {
            tracing::warn!("Rejected webhook with missing or invalid signature");
            return json_error(StatusCode::BAD_REQUEST, "invalid signature").into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed webhook payload: {e}");
            return json_error(StatusCode::BAD_REQUEST, "invalid payload").into_response();
        }
    };

    for event in &payload.events {
        handle_event(&state, event).await;
    }

    (StatusCode::OK, "OK").into_response()
}

async fn handle_event(state: &AppState, event: &WebhookEvent) {
    let Some(text) = event.text_message() else {
        return;
    };
    let group_id = event.context_id();

    let Some(reply) = state.bot.handle_text(&group_id, text, state.bot.now()).await else {
        return;
    };
    let Some(reply_token) = event.reply_token.as_deref() else {
        return;
    };

    if let Err(e) = state.messenger.reply(reply_token, &[reply]).await {
        tracing::error!(group_id = %group_id, "Reply failed: {e}");
        metrics::PUSH_FAILURES_TOTAL.inc();
    }
}
