// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod autoreply;
pub mod linker;
pub mod state;
pub mod zalo;

pub use autoreply::{AutoReply, Decision, ReplyRule};
pub use linker::{OptInOutcome, SessionCredential};
pub use zalo::{MessagingChannel, ProviderApi, ZaloClient, ZaloProfile};
