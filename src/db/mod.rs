// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity directory and diagnostics storage.
//!
//! Handlers only see the [`IdentityDirectory`] and [`DiagnosticsSink`]
//! traits; [`FirestoreDb`] backs them in production and
//! [`MemoryDirectory`] in tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDirectory;

use crate::error::AppError;
use crate::models::{AppUser, NewUser, TransportFailure};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Zalo link uniqueness records (keyed by Zalo user ID)
    pub const ZALO_LINKS: &str = "zalo_links";
    /// Transport failure diagnostics
    pub const ERRORS: &str = "errors";
}

/// Outcome of trying to attach a Zalo ID to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClaim {
    /// The link now belongs to the requested user (new or already theirs).
    Claimed,
    /// Another user already owns the link.
    Taken { owner_uid: String },
}

/// Application user store.
///
/// Implementations must make [`IdentityDirectory::claim_link`] an
/// insert-if-absent operation: it is what keeps a Zalo ID linked to at
/// most one user when two logins race. The link record is authoritative;
/// the `zalo_uid` field on the user is written after it and may lag.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Get a user by uid.
    async fn get_user(&self, uid: &str) -> Result<Option<AppUser>, AppError>;

    /// Find the user linked to a Zalo ID.
    async fn find_by_zalo_uid(&self, zalo_uid: &str) -> Result<Option<AppUser>, AppError>;

    /// Create a user and assign its uid.
    async fn create_user(&self, new_user: NewUser) -> Result<AppUser, AppError>;

    /// Replace a user document. Absent optional fields are removed.
    async fn upsert_user(&self, user: &AppUser) -> Result<(), AppError>;

    /// Owner of the link record for `zalo_uid`, if one exists.
    async fn link_owner(&self, zalo_uid: &str) -> Result<Option<String>, AppError>;

    /// Reserve `zalo_uid` for `uid` unless someone else holds it.
    async fn claim_link(&self, zalo_uid: &str, uid: &str) -> Result<LinkClaim, AppError>;

    /// Drop the link record if it belongs to `uid`.
    async fn release_link(&self, zalo_uid: &str, uid: &str) -> Result<(), AppError>;
}

/// Where transport failures are recorded.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn record_transport_failure(&self, failure: &TransportFailure) -> Result<(), AppError>;
}
