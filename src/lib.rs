// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zalo bridge: link Zalo identities to application users and relay
//! Official Account messages.
//!
//! This crate provides the backend API that exchanges Zalo OAuth codes for
//! application session credentials, manages the Zalo link on user records,
//! and answers Zalo webhook events.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::IdentityDirectory;
use services::{AutoReply, MessagingChannel, ProviderApi};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub directory: Arc<dyn IdentityDirectory>,
    pub provider: Arc<dyn ProviderApi>,
    pub channel: Arc<dyn MessagingChannel>,
    pub auto_reply: AutoReply,
}
