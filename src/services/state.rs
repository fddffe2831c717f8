// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed `state` parameter for the Zalo opt-in redirect.
//!
//! Format before encoding: `uid|timestamp_hex|signature_hex`, where the
//! signature is HMAC-SHA256 over `uid|timestamp_hex`. The whole string is
//! URL-safe base64 without padding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// How long an issued state stays valid.
pub const STATE_TTL_SECS: u64 = 24 * 60 * 60;

/// Issue a signed state for `uid`.
pub fn sign_state(uid: &str, secret: &[u8]) -> anyhow::Result<String> {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    sign_state_at(uid, timestamp, secret)
}

fn sign_state_at(uid: &str, timestamp: u64, secret: &[u8]) -> anyhow::Result<String> {
    if uid.contains('|') {
        anyhow::bail!("uid must not contain '|'");
    }

    let payload = format!("{}|{:x}", uid, timestamp);
    let signature = hex::encode(mac(secret, &payload)?);

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a state and return the uid it was issued for.
///
/// Returns `None` for malformed, tampered or expired states.
pub fn verify_state(state: &str, secret: &[u8]) -> Option<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    verify_state_at(state, secret, now)
}

fn verify_state_at(state: &str, secret: &[u8], now: u64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    let [uid, timestamp_hex, signature_hex] = parts.as_slice() else {
        return None;
    };
    if uid.is_empty() {
        return None;
    }

    let payload = format!("{}|{}", uid, timestamp_hex);
    let expected = mac(secret, &payload).ok()?;
    let provided = hex::decode(signature_hex).ok()?;

    if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        tracing::error!("Opt-in state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = u64::from_str_radix(timestamp_hex, 16).ok()?;
    if issued_at > now + 60 || now.saturating_sub(issued_at) > STATE_TTL_SECS {
        tracing::warn!(uid = %uid, "Opt-in state expired");
        return None;
    }

    Some(uid.to_string())
}

fn mac(secret: &[u8], payload: &str) -> anyhow::Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";

    #[test]
    fn test_verify_state_success() {
        let state = sign_state("user-123", SECRET).unwrap();
        assert_eq!(verify_state(&state, SECRET), Some("user-123".to_string()));
    }

    #[test]
    fn test_verify_state_wrong_secret() {
        let state = sign_state("user-123", SECRET).unwrap();
        assert_eq!(verify_state(&state, b"wrong_key"), None);
    }

    #[test]
    fn test_verify_state_tampered_uid() {
        let state = sign_state("user-123", SECRET).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
        let forged = URL_SAFE_NO_PAD.encode(decoded.replacen("user-123", "admin-1", 1));
        assert_eq!(verify_state(&forged, SECRET), None);
    }

    #[test]
    fn test_verify_state_expired() {
        let issued = 1_700_000_000;
        let state = sign_state_at("user-123", issued, SECRET).unwrap();

        assert_eq!(
            verify_state_at(&state, SECRET, issued + 10),
            Some("user-123".to_string())
        );
        assert_eq!(
            verify_state_at(&state, SECRET, issued + STATE_TTL_SECS + 1),
            None
        );
    }

    #[test]
    fn test_verify_state_malformed() {
        // A raw uid, as sent by older frontends, is rejected.
        assert_eq!(verify_state("user-123", SECRET), None);
        assert_eq!(verify_state(&URL_SAFE_NO_PAD.encode("invalid|format"), SECRET), None);
        assert_eq!(verify_state("", SECRET), None);
    }

    #[test]
    fn test_state_is_url_safe() {
        let state = sign_state("user-123", SECRET).unwrap();
        assert!(!state.contains('+'));
        assert!(!state.contains('/'));
        assert!(!state.contains('='));
    }

    #[test]
    fn test_uid_with_separator_is_refused() {
        assert!(sign_state("a|b", SECRET).is_err());
    }
}
