// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zalo API client.
//!
//! Handles:
//! - OAuth code exchange and profile lookup (v3 code flow, v4 token flow)
//! - Official Account follower lookup (opt-in)
//! - Official Account text messages
//!
//! Zalo reports most failures as HTTP 200 with a non-zero `error` field, so
//! every response body is inspected. Network and decoding failures are
//! recorded through the [`DiagnosticsSink`] before being returned.

use crate::config::{Config, ZaloEndpoints};
use crate::db::DiagnosticsSink;
use crate::error::AppError;
use crate::models::TransportFailure;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Profile fields requested from the Graph API.
const PROFILE_FIELDS: &str = "id,birthday,name,gender,picture";

/// Identity lookups against Zalo.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// v3 flow: exchange an authorization code, then fetch the profile.
    async fn exchange_code_for_profile(&self, code: &str) -> Result<ZaloProfile, AppError>;

    /// v4 flow: the client already holds a user access token.
    async fn exchange_access_token_for_profile(
        &self,
        access_token: &str,
    ) -> Result<ZaloProfile, AppError>;

    /// Resolve an Official Account follower. `None` when Zalo has no such follower.
    async fn get_follower(&self, handle: &str) -> Result<Option<String>, AppError>;
}

/// Outbound text delivery to a Zalo user.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AppError>;
}

/// Verified Zalo user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZaloProfile {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<ZaloPicture>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZaloPicture {
    #[serde(default)]
    pub data: Option<ZaloPictureData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZaloPictureData {
    #[serde(default)]
    pub url: Option<String>,
}

impl ZaloProfile {
    /// Profile picture URL, if Zalo returned one.
    pub fn photo_url(&self) -> Option<&str> {
        self.picture
            .as_ref()
            .and_then(|p| p.data.as_ref())
            .and_then(|d| d.url.as_deref())
    }
}

/// Zalo IDs arrive as strings on some endpoints and numbers on others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Zalo REST client.
#[derive(Clone)]
pub struct ZaloClient {
    http: reqwest::Client,
    endpoints: ZaloEndpoints,
    app_id: String,
    app_secret: String,
    oa_access_token: Option<String>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ZaloClient {
    /// Create a client from application config.
    pub fn new(config: &Config, diagnostics: Arc<dyn DiagnosticsSink>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed building Zalo HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoints: config.zalo_endpoints.clone(),
            app_id: config.zalo_app_id.clone(),
            app_secret: config.zalo_app_secret.clone(),
            oa_access_token: config.zalo_oa_access_token.clone(),
            diagnostics,
        })
    }

    /// OA access token, logging when it is missing.
    ///
    /// A missing token does not short-circuit: the call is still made and
    /// Zalo's rejection is reported like any other API error.
    fn oa_token(&self, operation: &str) -> &str {
        match self.oa_access_token.as_deref() {
            Some(token) => token,
            None => {
                tracing::error!(operation, "Missing Zalo OA access token");
                ""
            }
        }
    }

    /// Send a request and decode the JSON body.
    ///
    /// Transport and decoding failures are recorded as diagnostics.
    async fn call(
        &self,
        operation: &'static str,
        method: Method,
        url: String,
        query: &[(&str, &str)],
        headers: &[(&'static str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        let mut request = self.http.request(method.clone(), &url).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let message = format!("{} request failed: {}", operation, e);
                self.record_failure(operation, &method, &url, body, &message)
                    .await;
                return Err(AppError::Transport(message));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                let message = format!("{} response could not be read: {}", operation, e);
                self.record_failure(operation, &method, &url, body, &message)
                    .await;
                return Err(AppError::Transport(message));
            }
        };

        if !status.is_success() {
            tracing::error!(operation, status = %status, body = %text, "Zalo request failed");
            return Err(AppError::ProviderApi(format!("HTTP {}: {}", status, text)));
        }

        match serde_json::from_str(&text) {
            Ok(json) => Ok(json),
            Err(e) => {
                let message = format!("{} returned invalid JSON: {} ({})", operation, e, text);
                self.record_failure(operation, &method, &url, body, &message)
                    .await;
                Err(AppError::Transport(message))
            }
        }
    }

    async fn record_failure(
        &self,
        operation: &str,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        message: &str,
    ) {
        let failure = TransportFailure::new(operation, method.as_str(), url, body, message);
        tracing::error!(
            operation,
            url = %failure.url,
            error = %message,
            "Zalo transport failure"
        );
        if let Err(e) = self.diagnostics.record_transport_failure(&failure).await {
            tracing::warn!(error = %e, "Failed to record transport failure");
        }
    }

    async fn fetch_profile(
        &self,
        query: &[(&str, &str)],
        headers: &[(&'static str, &str)],
    ) -> Result<ZaloProfile, AppError> {
        let url = format!("{}/v2.0/me", self.endpoints.graph_base);
        let json = self
            .call("zalo/me", Method::GET, url, query, headers, None)
            .await?;
        profile_from_response(json)
    }
}

#[async_trait]
impl ProviderApi for ZaloClient {
    async fn exchange_code_for_profile(&self, code: &str) -> Result<ZaloProfile, AppError> {
        let url = format!("{}/v3/access_token", self.endpoints.oauth_base);
        let token_json = self
            .call(
                "zalo/access_token",
                Method::GET,
                url,
                &[
                    ("app_id", self.app_id.as_str()),
                    ("app_secret", self.app_secret.as_str()),
                    ("code", code),
                ],
                &[],
                None,
            )
            .await?;

        let access_token = match token_json.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                tracing::error!(response = %token_json, "Zalo code exchange returned no access token");
                return Err(AppError::ProviderAuth(zalo_error_message(
                    &token_json,
                    "Invalid authorization code",
                )));
            }
        };

        self.fetch_profile(
            &[
                ("access_token", access_token.as_str()),
                ("fields", PROFILE_FIELDS),
            ],
            &[],
        )
        .await
    }

    async fn exchange_access_token_for_profile(
        &self,
        access_token: &str,
    ) -> Result<ZaloProfile, AppError> {
        self.fetch_profile(
            &[("fields", PROFILE_FIELDS)],
            &[("access_token", access_token)],
        )
        .await
    }

    async fn get_follower(&self, handle: &str) -> Result<Option<String>, AppError> {
        let url = format!("{}/v2.0/oa/getprofile", self.endpoints.openapi_base);
        let data = json!({ "user_id": handle }).to_string();
        let access_token = self.oa_token("zalo/getprofile");

        let response = self
            .call(
                "zalo/getprofile",
                Method::GET,
                url,
                &[("access_token", access_token), ("data", data.as_str())],
                &[],
                None,
            )
            .await?;

        follower_from_response(&response)
    }
}

#[async_trait]
impl MessagingChannel for ZaloClient {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        let url = format!("{}/v2.0/oa/message", self.endpoints.openapi_base);
        let access_token = self.oa_token("zalo/send");
        let body = json!({
            "recipient": { "user_id": recipient },
            "message": { "text": text },
        });

        let response = self
            .call(
                "zalo/send",
                Method::POST,
                url,
                &[("access_token", access_token)],
                &[],
                Some(&body),
            )
            .await?;

        if zalo_error_code(&response) != 0 {
            tracing::error!(recipient, response = %response, "Zalo rejected message");
            return Err(AppError::ProviderApi(zalo_error_message(
                &response,
                "Message rejected",
            )));
        }

        tracing::info!(recipient, "Zalo message sent");
        Ok(())
    }
}

/// Validate a `/me` response: it must carry a non-empty `id`.
fn profile_from_response(json: Value) -> Result<ZaloProfile, AppError> {
    let profile: ZaloProfile = serde_json::from_value(json.clone())
        .map_err(|e| AppError::ProviderAuth(format!("Malformed Zalo profile: {}", e)))?;

    match profile.id.as_deref() {
        Some(id) if !id.is_empty() => Ok(profile),
        _ => {
            tracing::error!(response = %json, "Zalo profile response has no id");
            Err(AppError::ProviderAuth(zalo_error_message(
                &json,
                "Invalid access token",
            )))
        }
    }
}

/// Extract `data.user_id` from a `getprofile` response.
fn follower_from_response(response: &Value) -> Result<Option<String>, AppError> {
    let Some(data) = response.get("data").filter(|d| !d.is_null()) else {
        tracing::error!(response = %response, "Zalo follower lookup returned no data");
        return Ok(None);
    };

    Ok(match data.get("user_id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => {
            tracing::error!(response = %response, "Zalo follower data has no user_id");
            None
        }
    })
}

fn zalo_error_code(response: &Value) -> i64 {
    response.get("error").and_then(Value::as_i64).unwrap_or(0)
}

fn zalo_error_message(response: &Value, fallback: &str) -> String {
    response
        .get("message")
        .or_else(|| response.get("error_description"))
        .or_else(|| response.get("error_name"))
        .and_then(Value::as_str)
        .map(|m| format!("{}: {}", fallback, m))
        .unwrap_or_else(|| fallback.to_string())
}
