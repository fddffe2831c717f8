// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zalo_bridge::config::Config;
use zalo_bridge::db::{FirestoreDb, MemoryDirectory};
use zalo_bridge::error::AppError;
use zalo_bridge::middleware::auth::create_session_token;
use zalo_bridge::routes::create_router;
use zalo_bridge::services::{AutoReply, MessagingChannel, ProviderApi, ZaloProfile};
use zalo_bridge::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Zalo stand-in: every code or token resolves to `profile`.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeProvider {
    pub profile: Mutex<ZaloProfile>,
    pub follower: Mutex<Option<String>>,
    pub fail_with_auth_error: Mutex<bool>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn with_profile(id: &str, name: &str) -> Self {
        let provider = Self::default();
        *provider.profile.lock().unwrap() = ZaloProfile {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        };
        provider
    }

    pub fn set_follower(&self, follower: Option<&str>) {
        *self.follower.lock().unwrap() = follower.map(str::to_string);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn profile(&self) -> Result<ZaloProfile, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_with_auth_error.lock().unwrap() {
            return Err(AppError::ProviderAuth("Invalid authorization code".to_string()));
        }
        Ok(self.profile.lock().unwrap().clone())
    }
}

#[async_trait]
impl ProviderApi for FakeProvider {
    async fn exchange_code_for_profile(&self, _code: &str) -> Result<ZaloProfile, AppError> {
        self.profile()
    }

    async fn exchange_access_token_for_profile(
        &self,
        _access_token: &str,
    ) -> Result<ZaloProfile, AppError> {
        self.profile()
    }

    async fn get_follower(&self, _handle: &str) -> Result<Option<String>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.follower.lock().unwrap().clone())
    }
}

/// Channel that records every send instead of calling Zalo.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingChannel {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        if *self.fail.lock().unwrap() {
            return Err(AppError::ProviderApi("Message rejected".to_string()));
        }
        Ok(())
    }
}

/// Everything a router test needs to inspect.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub directory: Arc<MemoryDirectory>,
    pub provider: Arc<FakeProvider>,
    pub channel: Arc<RecordingChannel>,
}

/// Create a test app backed by in-memory fakes.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(FakeProvider::with_profile("4213458921", "Nguyen Van A"))
}

#[allow(dead_code)]
pub fn create_test_app_with(provider: FakeProvider) -> TestApp {
    let directory = Arc::new(MemoryDirectory::new());
    let provider = Arc::new(provider);
    let channel = Arc::new(RecordingChannel::default());

    let state = Arc::new(AppState {
        config: Config::test_default(),
        directory: directory.clone(),
        provider: provider.clone(),
        channel: channel.clone(),
        auto_reply: AutoReply::default(),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        directory,
        provider,
        channel,
    }
}

/// Session credential signed with the test key.
#[allow(dead_code)]
pub fn session_token(uid: &str, admin: bool) -> String {
    create_session_token(uid, admin, &Config::test_default().jwt_signing_key).unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
