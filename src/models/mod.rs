// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod diagnostic;
pub mod event;
pub mod user;

pub use diagnostic::TransportFailure;
pub use event::{EventMessage, InboundEvent};
pub use user::{AppUser, NewUser, ZaloLink};
