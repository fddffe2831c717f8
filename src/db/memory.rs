// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process identity directory for tests and local runs.

use crate::db::{DiagnosticsSink, IdentityDirectory, LinkClaim};
use crate::error::AppError;
use crate::models::{AppUser, NewUser, TransportFailure};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Mutex;

/// Directory held entirely in memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, AppUser>,
    /// Zalo ID -> owning uid
    links: DashMap<String, String>,
    failures: Mutex<Vec<TransportFailure>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Recorded transport failures, oldest first.
    pub fn transport_failures(&self) -> Vec<TransportFailure> {
        self.failures
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn get_user(&self, uid: &str) -> Result<Option<AppUser>, AppError> {
        Ok(self.users.get(uid).map(|u| u.value().clone()))
    }

    async fn find_by_zalo_uid(&self, zalo_uid: &str) -> Result<Option<AppUser>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.zalo_uid.as_deref() == Some(zalo_uid))
            .map(|u| u.value().clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<AppUser, AppError> {
        let now = now_rfc3339();
        let user = AppUser {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            display_name: new_user.display_name,
            photo_url: new_user.photo_url,
            zalo_uid: None,
            gender: None,
            birthday: None,
            admin: false,
            created_at: now.clone(),
            updated_at: now,
        };
        self.users.insert(user.uid.clone(), user.clone());
        Ok(user)
    }

    async fn upsert_user(&self, user: &AppUser) -> Result<(), AppError> {
        self.users.insert(user.uid.clone(), user.clone());
        Ok(())
    }

    async fn link_owner(&self, zalo_uid: &str) -> Result<Option<String>, AppError> {
        Ok(self.links.get(zalo_uid).map(|owner| owner.value().clone()))
    }

    async fn claim_link(&self, zalo_uid: &str, uid: &str) -> Result<LinkClaim, AppError> {
        match self.links.entry(zalo_uid.to_string()) {
            Entry::Occupied(entry) if entry.get() == uid => Ok(LinkClaim::Claimed),
            Entry::Occupied(entry) => Ok(LinkClaim::Taken {
                owner_uid: entry.get().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(uid.to_string());
                Ok(LinkClaim::Claimed)
            }
        }
    }

    async fn release_link(&self, zalo_uid: &str, uid: &str) -> Result<(), AppError> {
        self.links.remove_if(zalo_uid, |_, owner| owner == uid);
        Ok(())
    }
}

#[async_trait]
impl DiagnosticsSink for MemoryDirectory {
    async fn record_transport_failure(&self, failure: &TransportFailure) -> Result<(), AppError> {
        self.failures
            .lock()
            .map_err(|_| AppError::Database("diagnostics lock poisoned".to_string()))?
            .push(failure.clone());
        Ok(())
    }
}
