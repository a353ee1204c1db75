// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Lines and Stations (externally authored, read-only)
//! - Users (profile storage)
//! - Visits (`users/{uid}/visits/{station_id}` sub-collection)

use crate::db::{collections, visit_document_id, DocumentStore, VisitSink};
use crate::error::{AppError, Result};
use crate::models::{Line, Station, StationVisit, User};
use crate::observe::Subscription;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{
    FirestoreDocument, FirestoreListenEvent, FirestoreListener, FirestoreListenerParams,
    FirestoreListenerTarget, FirestoreMemListenStateStorage,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_LISTEN_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Each subscription owns its own listener, so one target ID is enough.
const VISITS_LISTEN_TARGET: u32 = 1;

type VisitListener = FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    listen_retry_delay: Duration,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Network(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            listen_retry_delay: DEFAULT_LISTEN_RETRY_DELAY,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
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
            AppError::Network(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            listen_retry_delay: DEFAULT_LISTEN_RETRY_DELAY,
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            listen_retry_delay: DEFAULT_LISTEN_RETRY_DELAY,
        }
    }

    /// Set how long a dropped visit listener waits before reconnecting.
    pub fn with_listen_retry_delay(mut self, delay: Duration) -> Self {
        self.listen_retry_delay = delay;
        self
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Network("Database not connected (offline mode)".to_string()))
    }

    // ─── Line & Station Operations ───────────────────────────────

    async fn fetch_active<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let documents: Vec<FirestoreDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field("is_active").eq(true)]))
            .query()
            .await
            .map_err(map_firestore_error)?;

        let total = documents.len();
        let decoded: Vec<T> = decode_documents(collection, &documents);

        tracing::debug!(
            collection,
            total,
            decoded = decoded.len(),
            "Fetched active documents"
        );

        Ok(decoded)
    }

    // ─── Visit Operations ────────────────────────────────────────

    fn visits_parent(&self, user_id: &str) -> Result<firestore::ParentPathBuilder> {
        self.get_client()?
            .parent_path(collections::USERS, user_id)
            .map_err(map_firestore_error)
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn fetch_active_lines(&self) -> Result<Vec<Line>> {
        self.fetch_active(collections::LINES).await
    }

    async fn fetch_active_stations(&self) -> Result<Vec<Station>> {
        self.fetch_active(collections::STATIONS).await
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(map_firestore_error)
    }

    async fn upsert_user(&self, user_id: &str, user: &User) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(user)
            .execute()
            .await
            .map_err(map_firestore_error)?;
        Ok(())
    }

    async fn has_any_visits(&self, user_id: &str) -> Result<bool> {
        let parent_path = self.visits_parent(user_id)?;

        let documents: Vec<FirestoreDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::VISITS)
            .parent(&parent_path)
            .limit(1)
            .query()
            .await
            .map_err(map_firestore_error)?;

        Ok(!documents.is_empty())
    }

    async fn list_visits(&self, user_id: &str) -> Result<Vec<StationVisit>> {
        let parent_path = self.visits_parent(user_id)?;

        let documents: Vec<FirestoreDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::VISITS)
            .parent(&parent_path)
            .query()
            .await
            .map_err(map_firestore_error)?;

        Ok(decode_documents(collections::VISITS, &documents))
    }

    async fn set_visit(&self, user_id: &str, visit: &StationVisit) -> Result<()> {
        let parent_path = self.visits_parent(user_id)?;

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::VISITS)
            .document_id(visit_document_id(&visit.station_id)?)
            .parent(&parent_path)
            .object(visit)
            .execute()
            .await
            .map_err(map_firestore_error)?;
        Ok(())
    }

    async fn delete_visit(&self, user_id: &str, station_id: &str) -> Result<()> {
        let parent_path = self.visits_parent(user_id)?;

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::VISITS)
            .document_id(visit_document_id(station_id)?)
            .parent(&parent_path)
            .execute()
            .await
            .map_err(map_firestore_error)?;
        Ok(())
    }

    /// Start delivering visit snapshots for the user.
    ///
    /// Firestore pushes document events through a listener on the visits
    /// sub-collection; each burst of events triggers one full re-read so the
    /// sink always sees a complete snapshot.
    fn subscribe_visits(&self, user_id: &str, sink: VisitSink) -> Result<Subscription> {
        // Fail fast when offline instead of spawning a task that can only error.
        self.get_client()?;

        let db = self.clone();
        let user_id = user_id.to_string();

        tracing::info!(user_id = %user_id, "Starting visit subscription");

        let handle = tokio::spawn(async move {
            let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();

            // Held for the life of the task; dropping it closes the listen stream.
            let _listener = match db.visit_listener(&user_id, changed_tx).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Visit listener failed to start");
                    sink(Err(e));
                    return;
                }
            };

            let mut snapshots = SnapshotState::default();
            db.emit_visit_snapshot(&user_id, &sink, &mut snapshots).await;

            while changed_rx.recv().await.is_some() {
                while changed_rx.try_recv().is_ok() {}
                db.emit_visit_snapshot(&user_id, &sink, &mut snapshots).await;
            }

            tracing::debug!(user_id = %user_id, "Visit listener stopped");
        });

        Ok(Subscription::from_task(handle))
    }
}

/// What a visit subscription last delivered.
#[derive(Default)]
struct SnapshotState {
    last: Option<Vec<StationVisit>>,
    failing: bool,
}

impl FirestoreDb {
    /// Listen on `users/{uid}/visits`, signalling `changed` on every document event.
    async fn visit_listener(
        &self,
        user_id: &str,
        changed: mpsc::UnboundedSender<()>,
    ) -> Result<VisitListener> {
        let client = self.get_client()?;
        let parent_path = self.visits_parent(user_id)?;

        let mut listener = client
            .create_listener_with_params(
                FirestoreMemListenStateStorage::new(),
                FirestoreListenerParams::new().with_retry_delay(self.listen_retry_delay),
            )
            .await
            .map_err(map_firestore_error)?;

        client
            .fluent()
            .select()
            .from(collections::VISITS)
            .parent(&parent_path)
            .listen()
            .add_target(FirestoreListenerTarget::new(VISITS_LISTEN_TARGET), &mut listener)
            .map_err(map_firestore_error)?;

        listener
            .start(move |event| {
                let changed = changed.clone();
                async move {
                    // Target changes only carry resume tokens and consistency markers
                    if !matches!(event, FirestoreListenEvent::TargetChange(_)) {
                        // A closed receiver means the subscription is being torn down
                        let _ = changed.send(());
                    }
                    Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                }
            })
            .await
            .map_err(map_firestore_error)?;

        Ok(listener)
    }

    /// Re-read the visits and hand them to `sink` if they differ from the last snapshot.
    async fn emit_visit_snapshot(&self, user_id: &str, sink: &VisitSink, state: &mut SnapshotState) {
        match self.list_visits(user_id).await {
            Ok(mut visits) => {
                state.failing = false;
                visits.sort_by(|a, b| a.station_id.cmp(&b.station_id));
                if state.last.as_ref() != Some(&visits) {
                    tracing::debug!(user_id, count = visits.len(), "Visit snapshot changed");
                    state.last = Some(visits.clone());
                    sink(Ok(visits));
                }
            }
            Err(e) => {
                // Report once per failure streak
                if !state.failing {
                    tracing::warn!(user_id, error = %e, "Visit snapshot read failed");
                    sink(Err(e));
                }
                state.failing = true;
            }
        }
    }
}

/// Decode documents one by one, skipping any that do not match `T`.
fn decode_documents<T: DeserializeOwned>(collection: &str, documents: &[FirestoreDocument]) -> Vec<T> {
    documents
        .iter()
        .filter_map(
            |doc| match firestore::FirestoreDb::deserialize_doc_to::<T>(doc) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(
                        collection,
                        document = %doc.name,
                        error = %e,
                        "Skipping undecodable document"
                    );
                    None
                }
            },
        )
        .collect()
}

fn map_firestore_error(e: FirestoreError) -> AppError {
    match e {
        FirestoreError::DeserializeError(_) => AppError::Decode(e.to_string()),
        other => AppError::Network(other.to_string()),
    }
}
