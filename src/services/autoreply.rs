// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auto-reply rules for inbound Zalo messages.
//!
//! Classification is pure and stateless across deliveries: an event either
//! produces exactly one reply or nothing. Sending is the caller's job.

use crate::models::event::{InboundEvent, USER_SEND_TEXT};

/// Reply with `reply` when a text message equals `trigger` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRule {
    pub trigger: String,
    pub reply: String,
}

impl ReplyRule {
    pub fn new(trigger: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            reply: reply.into(),
        }
    }
}

/// What to do with one webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not a text message event.
    Ignore,
    /// A text message that no rule answers.
    NoReply,
    Reply { recipient: String, text: String },
}

/// Ordered rule set; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct AutoReply {
    rules: Vec<ReplyRule>,
}

impl Default for AutoReply {
    /// The connectivity check: "test" is answered with "success".
    fn default() -> Self {
        Self::new(vec![ReplyRule::new("test", "success")])
    }
}

impl AutoReply {
    pub fn new(rules: Vec<ReplyRule>) -> Self {
        Self { rules }
    }

    /// Classify an inbound event.
    pub fn classify(&self, event: &InboundEvent) -> Decision {
        if event.event_name != USER_SEND_TEXT {
            return Decision::Ignore;
        }

        let Some(text) = event.text() else {
            return Decision::NoReply;
        };

        let Some(rule) = self.rules.iter().find(|r| r.trigger == text) else {
            return Decision::NoReply;
        };

        match event.user_id_by_app.as_deref() {
            Some(recipient) if !recipient.is_empty() => Decision::Reply {
                recipient: recipient.to_string(),
                text: rule.reply.clone(),
            },
            _ => {
                tracing::warn!(trigger = %rule.trigger, "Matched text event has no user_id_by_app");
                Decision::NoReply
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> InboundEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_message_gets_success_reply() {
        let decision = AutoReply::default().classify(&event(json!({
            "event_name": "user_send_text",
            "user_id_by_app": "U1",
            "message": { "text": "test", "msg_id": "m1" }
        })));

        assert_eq!(
            decision,
            Decision::Reply {
                recipient: "U1".to_string(),
                text: "success".to_string()
            }
        );
    }

    #[test]
    fn other_text_gets_no_reply() {
        let decision = AutoReply::default().classify(&event(json!({
            "event_name": "user_send_text",
            "message": { "text": "hello" }
        })));
        assert_eq!(decision, Decision::NoReply);
    }

    #[test]
    fn non_text_events_are_ignored() {
        let decision = AutoReply::default().classify(&event(json!({
            "event_name": "follow",
            "user_id_by_app": "U1"
        })));
        assert_eq!(decision, Decision::Ignore);
    }

    #[test]
    fn trigger_match_is_exact() {
        let decision = AutoReply::default().classify(&event(json!({
            "event_name": "user_send_text",
            "user_id_by_app": "U1",
            "message": { "text": "Test " }
        })));
        assert_eq!(decision, Decision::NoReply);
    }

    #[test]
    fn first_matching_rule_wins() {
        let engine = AutoReply::new(vec![
            ReplyRule::new("hours", "8:00-17:00"),
            ReplyRule::new("hours", "unused"),
        ]);
        let decision = engine.classify(&event(json!({
            "event_name": "user_send_text",
            "user_id_by_app": "U7",
            "message": { "text": "hours" }
        })));

        assert_eq!(
            decision,
            Decision::Reply {
                recipient: "U7".to_string(),
                text: "8:00-17:00".to_string()
            }
        );
    }

    #[test]
    fn match_without_recipient_is_dropped() {
        let decision = AutoReply::default().classify(&event(json!({
            "event_name": "user_send_text",
            "message": { "text": "test" }
        })));
        assert_eq!(decision, Decision::NoReply);
    }
}
