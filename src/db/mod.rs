// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, plus an in-process store).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::{AppError, Result};
use crate::models::{Line, Station, StationVisit, User};
use crate::observe::Subscription;
use async_trait::async_trait;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const LINES: &str = "lines";
    pub const STATIONS: &str = "stations";
    pub const USERS: &str = "users";
    /// Sub-collection under `users/{uid}`, keyed by station ID
    pub const VISITS: &str = "visits";
}

/// Receives full replacement snapshots of a user's visit documents.
pub type VisitSink = Arc<dyn Fn(Result<Vec<StationVisit>>) + Send + Sync>;

/// Document ID of a visit: the station ID itself.
///
/// Writing the same station twice therefore overwrites one document. IDs that
/// Firestore cannot use as a single document ID are rejected.
pub fn visit_document_id(station_id: &str) -> Result<&str> {
    let reserved = station_id.starts_with("__") && station_id.ends_with("__");
    if station_id.is_empty()
        || station_id.contains('/')
        || station_id == "."
        || station_id == ".."
        || reserved
    {
        return Err(AppError::BadRequest(format!(
            "Invalid station ID: {:?}",
            station_id
        )));
    }
    Ok(station_id)
}

/// Typed access to the remote document collections.
///
/// Collection reads skip documents that fail to decode instead of failing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All lines with `is_active == true`.
    async fn fetch_active_lines(&self) -> Result<Vec<Line>>;

    /// All stations with `is_active == true`.
    async fn fetch_active_stations(&self) -> Result<Vec<Station>>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Create or replace the user document.
    async fn upsert_user(&self, user_id: &str, user: &User) -> Result<()>;

    /// Whether the user has at least one visit document (limit-1 query).
    async fn has_any_visits(&self, user_id: &str) -> Result<bool>;

    /// Every visit document of the user, soft-deleted ones included.
    async fn list_visits(&self, user_id: &str) -> Result<Vec<StationVisit>>;

    /// Write a visit at `users/{uid}/visits/{station_id}`.
    async fn set_visit(&self, user_id: &str, visit: &StationVisit) -> Result<()>;

    async fn delete_visit(&self, user_id: &str, station_id: &str) -> Result<()>;

    /// Start delivering visit snapshots for `user_id` to `sink`.
    ///
    /// The current snapshot is delivered first, then one per remote change,
    /// until the returned handle is cancelled or dropped.
    fn subscribe_visits(&self, user_id: &str, sink: VisitSink) -> Result<Subscription>;
}
