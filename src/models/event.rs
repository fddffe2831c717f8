// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound Zalo webhook events.

use serde::{Deserialize, Serialize};

/// Event name Zalo uses for a plain text message sent to the Official Account.
pub const USER_SEND_TEXT: &str = "user_send_text";

/// One webhook delivery. Fields this service does not act on are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub event_name: String,
    /// Sender ID scoped to the application
    #[serde(default)]
    pub user_id_by_app: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

/// Message body attached to `user_send_*` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub msg_id: Option<String>,
}

impl InboundEvent {
    /// Text of the attached message, if any.
    pub fn text(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.text.as_deref())
    }
}
