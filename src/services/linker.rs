// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zalo identity linking.
//!
//! - [`link_or_create`]: login. Finds the user linked to a verified Zalo
//!   profile, or creates one, and mints a session credential.
//! - [`opt_out`]: removes the caller's link.
//! - [`opt_in`]: attaches an Official Account follower to the user named by a
//!   signed opt-in state.
//!
//! The `zalo_links` record is the source of truth for a link and its claim
//! is the only serialization point. The `zalo_uid` field on the user is
//! written second; a login that finds a link record without that field
//! finishes the interrupted write instead of creating another user. Two
//! concurrent first logins may both create a user record, but only one of
//! them gets linked and both callers receive the winner's uid.

use crate::db::{IdentityDirectory, LinkClaim};
use crate::error::AppError;
use crate::middleware::auth::create_session_token;
use crate::models::{AppUser, NewUser};
use crate::services::state::verify_state;
use crate::services::zalo::{ProviderApi, ZaloProfile};
use crate::time_utils::now_rfc3339;

/// Session credential issued after a successful login.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub uid: String,
    pub token: String,
    /// True when this login created the user record.
    pub created: bool,
}

/// Find or create the user for a verified profile and mint a credential.
pub async fn link_or_create(
    directory: &dyn IdentityDirectory,
    profile: &ZaloProfile,
    signing_key: &[u8],
) -> Result<SessionCredential, AppError> {
    let zalo_uid = match profile.id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(AppError::ProviderAuth("Invalid access token".to_string())),
    };

    let (user, created) = match directory.find_by_zalo_uid(zalo_uid).await? {
        Some(user) => {
            tracing::debug!(uid = %user.uid, zalo_uid, "Existing Zalo link found");
            ensure_link_record(directory, zalo_uid, &user.uid).await?;
            (user, false)
        }
        None => match resume_link(directory, zalo_uid, profile).await? {
            Some(owner) => (owner, false),
            None => create_linked_user(directory, zalo_uid, profile).await?,
        },
    };

    let token = create_session_token(&user.uid, user.admin, signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(uid = %user.uid, zalo_uid, created, "Zalo login successful");

    Ok(SessionCredential {
        uid: user.uid,
        token,
        created,
    })
}

/// Users linked before link records existed only carry the `zalo_uid`
/// field. Give them a record so later claims see the link.
async fn ensure_link_record(
    directory: &dyn IdentityDirectory,
    zalo_uid: &str,
    uid: &str,
) -> Result<(), AppError> {
    let owner = match directory.link_owner(zalo_uid).await? {
        Some(owner) => owner,
        None => match directory.claim_link(zalo_uid, uid).await? {
            LinkClaim::Claimed => {
                tracing::info!(uid, zalo_uid, "Backfilled Zalo link record");
                return Ok(());
            }
            LinkClaim::Taken { owner_uid } => owner_uid,
        },
    };

    if owner != uid {
        tracing::warn!(
            uid,
            zalo_uid,
            owner_uid = %owner,
            "Zalo link record and user field disagree"
        );
    }
    Ok(())
}

/// Pick up a link record whose user field was never written.
async fn resume_link(
    directory: &dyn IdentityDirectory,
    zalo_uid: &str,
    profile: &ZaloProfile,
) -> Result<Option<AppUser>, AppError> {
    match directory.link_owner(zalo_uid).await? {
        Some(owner_uid) => finish_link(directory, zalo_uid, &owner_uid, profile).await,
        None => Ok(None),
    }
}

/// Bring the owner of a link record in line with it.
///
/// Returns the owner, or `None` after releasing a record that no longer
/// describes its owner (user gone, or since linked to another Zalo ID).
async fn finish_link(
    directory: &dyn IdentityDirectory,
    zalo_uid: &str,
    owner_uid: &str,
    profile: &ZaloProfile,
) -> Result<Option<AppUser>, AppError> {
    let Some(mut owner) = directory.get_user(owner_uid).await? else {
        tracing::warn!(zalo_uid, owner_uid, "Zalo link points at missing user, releasing");
        directory.release_link(zalo_uid, owner_uid).await?;
        return Ok(None);
    };

    match owner.zalo_uid.as_deref() {
        Some(linked) if linked == zalo_uid => Ok(Some(owner)),
        Some(linked) => {
            tracing::warn!(
                zalo_uid,
                owner_uid,
                linked,
                "Stale Zalo link record, releasing"
            );
            directory.release_link(zalo_uid, owner_uid).await?;
            Ok(None)
        }
        None => {
            apply_profile(&mut owner, zalo_uid, profile);
            directory.upsert_user(&owner).await?;
            tracing::info!(uid = owner_uid, zalo_uid, "Completed interrupted Zalo link");
            Ok(Some(owner))
        }
    }
}

fn apply_profile(user: &mut AppUser, zalo_uid: &str, profile: &ZaloProfile) {
    user.zalo_uid = Some(zalo_uid.to_string());
    user.gender = profile.gender.clone().or(user.gender.take());
    user.birthday = profile.birthday.clone().or(user.birthday.take());
    user.updated_at = now_rfc3339();
}

/// Create a user, claim the link, then store the remaining profile fields.
async fn create_linked_user(
    directory: &dyn IdentityDirectory,
    zalo_uid: &str,
    profile: &ZaloProfile,
) -> Result<(AppUser, bool), AppError> {
    let mut user = directory
        .create_user(NewUser {
            display_name: profile.name.clone().unwrap_or_default(),
            photo_url: profile.photo_url().unwrap_or_default().to_string(),
        })
        .await?;

    // A stale record released by `finish_link` gets one more claim.
    for _ in 0..2 {
        let owner_uid = match directory.claim_link(zalo_uid, &user.uid).await? {
            LinkClaim::Claimed => {
                apply_profile(&mut user, zalo_uid, profile);
                directory.upsert_user(&user).await?;
                tracing::info!(uid = %user.uid, zalo_uid, "New user linked to Zalo");
                return Ok((user, true));
            }
            LinkClaim::Taken { owner_uid } => owner_uid,
        };

        if let Some(owner) = finish_link(directory, zalo_uid, &owner_uid, profile).await? {
            // Lost a race with a concurrent first login. The new record stays
            // unlinked and never receives a credential.
            tracing::warn!(
                zalo_uid,
                orphan_uid = %user.uid,
                owner_uid = %owner.uid,
                "Concurrent login already linked this Zalo ID"
            );
            return Ok((owner, false));
        }
    }

    Err(AppError::Database(format!(
        "Zalo link {} kept changing during login",
        zalo_uid
    )))
}

/// Remove the caller's Zalo link. A user without a link is left untouched.
///
/// The link record goes first: if clearing the field then fails, the next
/// login still finds the user and restores the record.
pub async fn opt_out(directory: &dyn IdentityDirectory, uid: &str) -> Result<(), AppError> {
    let Some(mut user) = directory.get_user(uid).await? else {
        tracing::warn!(uid, "Opt-out for unknown user");
        return Ok(());
    };

    let Some(zalo_uid) = user.zalo_uid.take() else {
        tracing::debug!(uid, "Opt-out with no Zalo link");
        return Ok(());
    };

    directory.release_link(&zalo_uid, uid).await?;
    user.updated_at = now_rfc3339();
    directory.upsert_user(&user).await?;

    tracing::info!(uid, zalo_uid = %zalo_uid, "Zalo link removed");
    Ok(())
}

/// Result of an opt-in attempt. Every variant ends in the same redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptInOutcome {
    Linked { uid: String, zalo_uid: String },
    /// Zalo does not know the handle as a follower of the Official Account.
    NotFollower,
    /// The follower is already linked to a different user.
    LinkedElsewhere { owner_uid: String },
}

/// Attach the follower `handle` to the user named by `state`.
pub async fn opt_in(
    directory: &dyn IdentityDirectory,
    provider: &dyn ProviderApi,
    state_key: &[u8],
    state: &str,
    handle: &str,
) -> Result<OptInOutcome, AppError> {
    if handle.is_empty() {
        return Err(AppError::BadRequest("Missing Zalo user id".to_string()));
    }

    let uid = verify_state(state, state_key).ok_or(AppError::Unauthorized)?;

    let mut user = directory
        .get_user(&uid)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Unknown user {}", uid)))?;

    let Some(zalo_uid) = provider.get_follower(handle).await? else {
        return Ok(OptInOutcome::NotFollower);
    };

    if let LinkClaim::Taken { owner_uid } = directory.claim_link(&zalo_uid, &uid).await? {
        tracing::warn!(uid = %uid, zalo_uid = %zalo_uid, owner_uid = %owner_uid, "Opt-in for Zalo ID linked to another user");
        return Ok(OptInOutcome::LinkedElsewhere { owner_uid });
    }

    let previous = user.zalo_uid.replace(zalo_uid.clone());
    user.updated_at = now_rfc3339();
    directory.upsert_user(&user).await?;

    if let Some(previous) = previous.filter(|p| *p != zalo_uid) {
        directory.release_link(&previous, &uid).await?;
        tracing::info!(uid = %uid, previous = %previous, "Replaced previous Zalo link");
    }

    tracing::info!(uid = %uid, zalo_uid = %zalo_uid, "Zalo follower linked");
    Ok(OptInOutcome::Linked { uid, zalo_uid })
}
