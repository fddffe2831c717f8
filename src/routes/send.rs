// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin message sending.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

/// Send routes. Both paths require the admin claim (applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/send", post(admin_send))
        .route("/admin/send", post(admin_send))
}

/// Text message to a Zalo user.
#[derive(Debug, Deserialize, Validate)]
pub struct SendRequest {
    /// Recipient's Zalo user ID
    #[serde(default)]
    #[validate(length(min = 1, message = "psid must not be empty"))]
    pub psid: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "value must not be empty"))]
    pub value: String,
}

async fn admin_send(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    payload: std::result::Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    tracing::info!(admin = %caller.uid, psid = %request.psid, "Admin send");

    state.channel.send(&request.psid, &request.value).await?;
    Ok(Json(json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_fail_validation() {
        let request: SendRequest = serde_json::from_value(json!({ "psid": "", "value": "hi" })).unwrap();
        assert!(request.validate().is_err());

        let request: SendRequest = serde_json::from_value(json!({ "psid": "123" })).unwrap();
        assert!(request.validate().is_err());

        let request: SendRequest =
            serde_json::from_value(json!({ "psid": "123", "value": "hi" })).unwrap();
        assert!(request.validate().is_ok());
    }
}
