// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diagnostic record for failed calls to Zalo.

use serde::{Deserialize, Serialize};

/// Persisted in the `errors` collection for offline inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportFailure {
    /// Short tag of the failing call, e.g. `zalo/send`
    pub operation: String,
    pub method: String,
    /// Request URL without query string (which may carry tokens)
    pub url: String,
    /// JSON-encoded request body, if one was sent
    pub data: Option<String>,
    pub error: String,
    pub date: String,
}

impl TransportFailure {
    pub fn new(
        operation: &str,
        method: &str,
        url: &str,
        body: Option<&serde_json::Value>,
        error: impl Into<String>,
    ) -> Self {
        let url = url.split('?').next().unwrap_or_default().to_string();
        Self {
            operation: operation.to_string(),
            method: method.to_string(),
            url,
            data: body.map(|b| b.to_string()),
            error: error.into(),
            date: crate::time_utils::now_rfc3339(),
        }
    }

    /// Document ID: unique prefix plus a path-safe operation tag.
    pub fn document_id(&self) -> String {
        format!(
            "{}-{}",
            uuid::Uuid::new_v4(),
            urlencoding::encode(&self.operation)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_query_and_keeps_payload() {
        let body = json!({"recipient": {"user_id": "42"}});
        let failure = TransportFailure::new(
            "zalo/send",
            "POST",
            "https://openapi.zalo.me/v2.0/oa/message?access_token=secret",
            Some(&body),
            "connection refused",
        );

        assert_eq!(failure.url, "https://openapi.zalo.me/v2.0/oa/message");
        assert_eq!(failure.data.as_deref(), Some(r#"{"recipient":{"user_id":"42"}}"#));
        assert!(failure.document_id().ends_with("-zalo%2Fsend"));
    }
}
