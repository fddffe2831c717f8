// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (application identity records)
//! - Zalo links (one document per linked Zalo ID)
//! - Errors (transport failure diagnostics)

use crate::db::{collections, DiagnosticsSink, IdentityDirectory, LinkClaim};
use crate::error::AppError;
use crate::models::{AppUser, NewUser, TransportFailure, ZaloLink};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any bearer token; skip real credentials.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Underlying client, or an error if offline.
    pub fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_link(&self, zalo_uid: &str) -> Result<Option<ZaloLink>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ZALO_LINKS)
            .obj()
            .one(zalo_uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl IdentityDirectory for FirestoreDb {
    async fn get_user(&self, uid: &str) -> Result<Option<AppUser>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_zalo_uid(&self, zalo_uid: &str) -> Result<Option<AppUser>, AppError> {
        // The link collection guarantees uniqueness, so one result is enough.
        let users: Vec<AppUser> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.field("zalo_uid").eq(zalo_uid))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
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

        let _: AppUser = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.uid)
            .object(&user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(uid = %user.uid, "User created");
        Ok(user)
    }

    async fn upsert_user(&self, user: &AppUser) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn claim_link(&self, zalo_uid: &str, uid: &str) -> Result<LinkClaim, AppError> {
        let link = ZaloLink {
            uid: uid.to_string(),
            linked_at: now_rfc3339(),
            updated_at: None,
        };

        // `insert` is a create-only write: it fails if the document exists.
        let result: Result<ZaloLink, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ZALO_LINKS)
            .document_id(zalo_uid)
            .object(&link)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(LinkClaim::Claimed),
            Err(FirestoreError::DataConflictError(_)) => {
                let existing = self.get_link(zalo_uid).await?.ok_or_else(|| {
                    AppError::Database(format!(
                        "Zalo link {} conflicted but could not be read",
                        zalo_uid
                    ))
                })?;

                if existing.uid == uid {
                    Ok(LinkClaim::Claimed)
                } else {
                    Ok(LinkClaim::Taken {
                        owner_uid: existing.uid,
                    })
                }
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn link_owner(&self, zalo_uid: &str) -> Result<Option<String>, AppError> {
        Ok(self.get_link(zalo_uid).await?.map(|link| link.uid))
    }

    async fn release_link(&self, zalo_uid: &str, uid: &str) -> Result<(), AppError> {
        let link = match self.get_link(zalo_uid).await? {
            Some(link) if link.uid == uid => link,
            Some(link) => {
                tracing::warn!(
                    zalo_uid,
                    uid,
                    owner_uid = %link.uid,
                    "Not releasing Zalo link owned by another user"
                );
                return Ok(());
            }
            None => return Ok(()),
        };

        // Delete only the version that was read; a re-claim in between
        // changes the update time and makes the delete fail.
        let mut delete = self
            .get_client()?
            .fluent()
            .delete()
            .from(collections::ZALO_LINKS)
            .document_id(zalo_uid);
        if let Some(updated_at) = link.updated_at {
            delete = delete.precondition(FirestoreWritePrecondition::UpdateTime(updated_at));
        }

        match delete.execute().await {
            Ok(()) => {
                tracing::debug!(zalo_uid, uid, "Zalo link released");
                Ok(())
            }
            Err(e) => match self.get_link(zalo_uid).await? {
                None => Ok(()),
                Some(current) if current.uid != uid => {
                    tracing::warn!(
                        zalo_uid,
                        uid,
                        owner_uid = %current.uid,
                        "Zalo link re-claimed during release, left in place"
                    );
                    Ok(())
                }
                _ => Err(AppError::Database(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl DiagnosticsSink for FirestoreDb {
    async fn record_transport_failure(&self, failure: &TransportFailure) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ERRORS)
            .document_id(failure.document_id())
            .object(failure)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
