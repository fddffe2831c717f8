// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zalo Bridge API Server
//!
//! Links Zalo accounts to application users and answers Official Account
//! webhook events.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zalo_bridge::{
    config::{Config, DirectoryBackend},
    db::{DiagnosticsSink, FirestoreDb, IdentityDirectory, MemoryDirectory},
    services::{AutoReply, ZaloClient},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Zalo Bridge API");

    let (directory, diagnostics): (Arc<dyn IdentityDirectory>, Arc<dyn DiagnosticsSink>) =
        match config.directory_backend {
            DirectoryBackend::Firestore => {
                let db = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);
                let directory: Arc<dyn IdentityDirectory> = db.clone();
                (directory, db)
            }
            DirectoryBackend::Memory => {
                tracing::warn!("Using in-memory directory; data is lost on restart");
                let db = Arc::new(MemoryDirectory::new());
                let directory: Arc<dyn IdentityDirectory> = db.clone();
                (directory, db)
            }
        };

    let zalo = Arc::new(ZaloClient::new(&config, diagnostics)?);
    tracing::info!("Zalo client initialized");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        directory,
        provider: zalo.clone(),
        channel: zalo,
        auto_reply: AutoReply::default(),
    });

    // Build router
    let app = zalo_bridge::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,zalo_bridge=debug"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
