// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Zalo Official Account events.

use crate::models::InboundEvent;
use crate::services::autoreply::Decision;
use crate::AppState;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", post(handle_event))
}

/// Handle an incoming event (POST).
///
/// The body is read raw so that malformed deliveries are still acknowledged.
async fn handle_event(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(
                error = %e,
                body = %String::from_utf8_lossy(&body),
                "Failed to parse webhook event"
            );
            return Json(json!({}));
        }
    };

    tracing::info!(
        event_name = %event.event_name,
        sender = ?event.user_id_by_app,
        "Webhook event received"
    );

    match state.auto_reply.classify(&event) {
        Decision::Reply { recipient, text } => {
            if let Err(e) = state.channel.send(&recipient, &text).await {
                tracing::error!(error = %e, recipient = %recipient, "Failed to send auto-reply");
            }
        }
        Decision::NoReply => {
            tracing::debug!(text = ?event.text(), "No auto-reply for message");
        }
        Decision::Ignore => {
            tracing::debug!(event_name = %event.event_name, "Ignoring unhandled event type");
        }
    }

    // Always acknowledge so Zalo does not redeliver
    Json(json!({}))
}
