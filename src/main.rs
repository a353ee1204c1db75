// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ekicho API Server
//!
//! Serves station visit tracking: cloud-synced visits, progress and
//! company filters for the signed-in user.

use ekicho::{
    config::{Config, DocumentStoreKind},
    db::{DocumentStore, FirestoreDb, MemoryDb},
    local::{FileLocalStore, LocalStore},
    services::{IdTokenVerifier, IdentitySession},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Ekicho API");

    let db: Arc<dyn DocumentStore> = match config.document_store {
        DocumentStoreKind::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await?
                .with_listen_retry_delay(config.visit_listen_retry_delay),
        ),
        DocumentStoreKind::Memory => {
            tracing::warn!("Using in-memory document store; data is not persisted");
            Arc::new(MemoryDb::new())
        }
    };

    let local: Arc<dyn LocalStore> = Arc::new(FileLocalStore::open(&config.local_store_path)?);
    tracing::info!(path = %config.local_store_path.display(), "Local store opened");

    let verifier = Arc::new(IdTokenVerifier::new(&config.gcp_project_id)?);
    let identity = Arc::new(IdentitySession::with_verifier(verifier));

    let state = Arc::new(AppState::new(config.clone(), db, local, identity));

    // Lines and stations are public; load them before the first sign-in.
    state.sync.load_all().await;

    let app = ekicho::routes::create_router(state);

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

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ekicho=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
