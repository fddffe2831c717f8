// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session credential (JWT) minting and authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the session credential for browser clients.
pub const SESSION_COOKIE: &str = "zalo_bridge_token";

/// Header used by existing clients to pass the credential.
pub const LEGACY_TOKEN_HEADER: &str = "token";

/// Session credentials are short-lived; clients trade them for their own session.
const SESSION_TTL_SECS: usize = 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (application uid)
    pub sub: String,
    /// Caller may use the message sending routes
    #[serde(default)]
    pub admin: bool,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub admin: bool,
}

/// Create a session credential bound to `uid`.
pub fn create_session_token(uid: &str, admin: bool, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: uid.to_string(),
        admin,
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Decode and validate a session credential.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session credential");
        AppError::Unauthorized
    })?;

    if token_data.claims.sub.is_empty() {
        return Err(AppError::Unauthorized);
    }

    Ok(AuthUser {
        uid: token_data.claims.sub,
        admin: token_data.claims.admin,
    })
}

/// Find the credential: cookie first, then `Authorization: Bearer`, then
/// the legacy `token` header.
fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get(LEGACY_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

fn authenticate(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = extract_token(jar, headers)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;
    verify_session_token(&token, &state.config.jwt_signing_key)
}

/// Middleware that requires a valid session credential.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&state, &jar, request.headers())?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware that requires a session credential carrying the admin claim.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(&state, &jar, request.headers())?;

    if !auth_user.admin {
        tracing::warn!(uid = %auth_user.uid, path = %request.uri().path(), "Non-admin caller blocked");
        return Err(AppError::Forbidden(format!("Unauthorized: {}", auth_user.uid)));
    }

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}
