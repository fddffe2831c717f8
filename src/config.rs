// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; missing required secrets abort the
//! process before the listener is bound.

use std::env;
use std::time::Duration;

/// Default post-opt-in landing page.
const DEFAULT_OPT_IN_REDIRECT_URL: &str = "https://shop.luki.vn/profile";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Base URLs of the three Zalo API hosts.
#[derive(Debug, Clone)]
pub struct ZaloEndpoints {
    /// OAuth host (code → access token)
    pub oauth_base: String,
    /// Graph host (profile lookup)
    pub graph_base: String,
    /// Official Account host (messaging, follower lookup)
    pub openapi_base: String,
}

impl Default for ZaloEndpoints {
    fn default() -> Self {
        Self {
            oauth_base: "https://oauth.zaloapp.com".to_string(),
            graph_base: "https://graph.zalo.me".to_string(),
            openapi_base: "https://openapi.zalo.me".to_string(),
        }
    }
}

impl ZaloEndpoints {
    /// Point every host at the same base URL (used with a local mock server).
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            oauth_base: base.clone(),
            graph_base: base.clone(),
            openapi_base: base,
        }
    }
}

/// Which identity directory implementation to wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Zalo application ID (public)
    pub zalo_app_id: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Where the opt-in flow lands after completion
    pub opt_in_redirect_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Timeout applied to every outbound Zalo request
    pub http_timeout: Duration,
    /// Zalo API hosts
    pub zalo_endpoints: ZaloEndpoints,
    /// Identity directory backend
    pub directory_backend: DirectoryBackend,

    // --- Secrets ---
    /// Zalo application secret
    pub zalo_app_secret: String,
    /// Official Account access token used for messaging.
    /// Absent is tolerated: sends are still attempted and fail at Zalo.
    pub zalo_oa_access_token: Option<String>,
    /// JWT signing key for session credentials (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the opt-in `state` parameter
    pub opt_in_state_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            zalo_app_id: "test_app_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            opt_in_redirect_url: "http://localhost:5173/profile".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            http_timeout: Duration::from_secs(5),
            zalo_endpoints: ZaloEndpoints::default(),
            directory_backend: DirectoryBackend::Memory,
            zalo_app_secret: "test_secret".to_string(),
            zalo_oa_access_token: Some("test_oa_token".to_string()),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            opt_in_state_key: b"test_opt_in_state_key".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = ZaloEndpoints::default();
        let directory_backend = match env::var("DIRECTORY_BACKEND").as_deref() {
            Ok("memory") => DirectoryBackend::Memory,
            Ok("firestore") | Err(_) => DirectoryBackend::Firestore,
            Ok(other) => return Err(ConfigError::Invalid("DIRECTORY_BACKEND", other.to_string())),
        };

        let zalo_oa_access_token = env::var("ZALO_OA_ACCESS_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if zalo_oa_access_token.is_none() {
            tracing::warn!("ZALO_OA_ACCESS_TOKEN not set, outbound messages will be rejected by Zalo");
        }

        Ok(Self {
            zalo_app_id: required("ZALO_APP_ID")?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            opt_in_redirect_url: env::var("OPT_IN_REDIRECT_URL")
                .unwrap_or_else(|_| DEFAULT_OPT_IN_REDIRECT_URL.to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            http_timeout: Duration::from_secs(
                env::var("ZALO_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            zalo_endpoints: ZaloEndpoints {
                oauth_base: env::var("ZALO_OAUTH_BASE_URL").unwrap_or(defaults.oauth_base),
                graph_base: env::var("ZALO_GRAPH_BASE_URL").unwrap_or(defaults.graph_base),
                openapi_base: env::var("ZALO_OPENAPI_BASE_URL").unwrap_or(defaults.openapi_base),
            },
            directory_backend,

            zalo_app_secret: required("ZALO_APP_SECRET")?,
            zalo_oa_access_token,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            opt_in_state_key: required("OPT_IN_STATE_KEY")?.into_bytes(),
        })
    }
}

/// Read a required, non-empty, trimmed environment variable.
fn required(name: &'static str) -> Result<String, ConfigError> {
    let value = env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))?;
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
