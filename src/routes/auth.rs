// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zalo login and opt-in/opt-out routes.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, SESSION_COOKIE};
use crate::services::linker::{self, OptInOutcome};
use crate::services::state::sign_state;
use crate::services::ZaloProfile;
use crate::AppState;

/// Login version that passes a user access token instead of an authorization code.
const TOKEN_LOGIN_VERSION: &str = "v4";

/// Public routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/login/{version}", get(login_versioned))
        .route("/opt_in", get(opt_in))
}

/// Routes that need a session credential.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/opt_out", post(opt_out))
        .route("/opt_in/state", get(opt_in_state))
}

#[derive(Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// v3 login: `code` is a Zalo authorization code.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let code = required_code(params)?;
    let profile = state.provider.exchange_code_for_profile(&code).await?;
    complete_login(&state, jar, profile).await
}

/// Versioned login. `v4` clients send a user access token as `code`.
async fn login_versioned(
    State(state): State<Arc<AppState>>,
    Path(version): Path<String>,
    jar: CookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    if version != TOKEN_LOGIN_VERSION {
        return Err(AppError::BadRequest(format!(
            "Unsupported login version: {}",
            version
        )));
    }

    let access_token = required_code(params)?;
    let profile = state
        .provider
        .exchange_access_token_for_profile(&access_token)
        .await?;
    complete_login(&state, jar, profile).await
}

fn required_code(params: LoginParams) -> Result<String> {
    params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing code".to_string()))
}

async fn complete_login(
    state: &AppState,
    jar: CookieJar,
    profile: ZaloProfile,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let credential = linker::link_or_create(
        state.directory.as_ref(),
        &profile,
        &state.config.jwt_signing_key,
    )
    .await?;

    let cookie = Cookie::build((SESSION_COOKIE, credential.token.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token: credential.token,
        }),
    ))
}

/// Remove the caller's Zalo link.
async fn opt_out(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    linker::opt_out(state.directory.as_ref(), &user.uid).await?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Serialize)]
pub struct OptInStateResponse {
    pub state: String,
}

/// Issue a signed opt-in state for the caller.
async fn opt_in_state(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OptInStateResponse>> {
    let signed = sign_state(&user.uid, &state.config.opt_in_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("State signing failed: {}", e)))?;
    Ok(Json(OptInStateResponse { state: signed }))
}

#[derive(Deserialize)]
pub struct OptInParams {
    #[serde(default)]
    state: Option<String>,
    /// Follower handle supplied by Zalo
    #[serde(default)]
    uid: Option<String>,
}

/// Opt-in callback. Always redirects to the configured page.
async fn opt_in(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OptInParams>,
) -> Redirect {
    let redirect = Redirect::to(&state.config.opt_in_redirect_url);

    let (Some(signed), Some(handle)) = (params.state, params.uid) else {
        tracing::warn!("Opt-in callback missing state or uid");
        return redirect;
    };

    match linker::opt_in(
        state.directory.as_ref(),
        state.provider.as_ref(),
        &state.config.opt_in_state_key,
        &signed,
        &handle,
    )
    .await
    {
        Ok(OptInOutcome::Linked { uid, zalo_uid }) => {
            tracing::info!(uid = %uid, zalo_uid = %zalo_uid, "Opt-in completed");
        }
        Ok(outcome) => {
            tracing::warn!(handle = %handle, ?outcome, "Opt-in not applied");
        }
        Err(e) => {
            tracing::error!(handle = %handle, error = %e, "Opt-in failed");
        }
    }

    redirect
}
