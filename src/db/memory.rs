// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Documents are kept as JSON values so malformed documents can be stored and
//! skipped on read, the same way the Firestore backend treats them. Visit
//! subscribers get a fresh snapshot synchronously after every visit write.
//!
//! Failure injection hooks let tests exercise the network-error paths.

use crate::db::{collections, visit_document_id, DocumentStore, VisitSink};
use crate::error::{AppError, Result};
use crate::models::{Line, Station, StationVisit, User};
use crate::observe::{Observers, Subscription};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Failure count meaning "fail every time".
pub const ALWAYS: u32 = u32::MAX;

#[derive(Clone)]
struct VisitChange {
    user_id: String,
    visits: Vec<StationVisit>,
}

#[derive(Default)]
struct Inner {
    /// collection name -> document ID -> document
    documents: DashMap<String, BTreeMap<String, Value>>,
    /// user ID -> visit document ID -> document
    visits: DashMap<String, BTreeMap<String, Value>>,
    /// collection name -> remaining injected failures
    failing_collections: DashMap<String, u32>,
    /// station ID -> remaining injected visit write failures
    failing_visit_writes: DashMap<String, u32>,
    visit_writes: AtomicUsize,
    visit_changes: Observers<VisitChange>,
}

/// In-memory document store.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Seeding ─────────────────────────────────────────────────

    pub fn put_line(&self, line: &Line) {
        self.put(collections::LINES, &line.line_id, line);
    }

    pub fn put_station(&self, station: &Station) {
        self.put(collections::STATIONS, &station.station_id, station);
    }

    /// Store an arbitrary document, well-formed or not.
    pub fn put_raw(&self, collection: &str, document_id: &str, document: Value) {
        self.inner
            .documents
            .entry(collection.to_string())
            .or_default()
            .insert(document_id.to_string(), document);
    }

    /// Store an arbitrary visit document and notify subscribers.
    pub fn put_raw_visit(&self, user_id: &str, document_id: &str, document: Value) {
        self.inner
            .visits
            .entry(user_id.to_string())
            .or_default()
            .insert(document_id.to_string(), document);
        self.publish_visits(user_id);
    }

    fn put<T: Serialize>(&self, collection: &str, document_id: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(document) => self.put_raw(collection, document_id, document),
            Err(e) => tracing::error!(collection, error = %e, "Failed to encode seed document"),
        }
    }

    // ─── Failure Injection ───────────────────────────────────────

    /// Make the next `times` operations touching `collection` fail.
    ///
    /// `collection` is one of the names in [`collections`]; visit operations
    /// use [`collections::VISITS`].
    pub fn fail_collection(&self, collection: &str, times: u32) {
        self.inner
            .failing_collections
            .insert(collection.to_string(), times);
    }

    /// Make the next `times` writes of the visit for `station_id` fail.
    pub fn fail_visit_writes(&self, station_id: &str, times: u32) {
        self.inner
            .failing_visit_writes
            .insert(station_id.to_string(), times);
    }

    // ─── Inspection ──────────────────────────────────────────────

    /// Number of successful visit writes and deletes so far.
    pub fn visit_write_count(&self) -> usize {
        self.inner.visit_writes.load(Ordering::SeqCst)
    }

    /// Station IDs of the user's stored visit documents, sorted.
    pub fn visit_station_ids(&self, user_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .decoded_visits(user_id)
            .into_iter()
            .map(|v| v.station_id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of stored visit documents for the user, decodable or not.
    pub fn visit_document_count(&self, user_id: &str) -> usize {
        self.inner
            .visits
            .get(user_id)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn visit_subscriber_count(&self) -> usize {
        self.inner.visit_changes.len()
    }

    // ─── Helpers ─────────────────────────────────────────────────

    fn check_failure(&self, collection: &str) -> Result<()> {
        if take_failure(&self.inner.failing_collections, collection) {
            return Err(AppError::Network(format!(
                "Injected failure for collection {}",
                collection
            )));
        }
        Ok(())
    }

    fn active<T: DeserializeOwned>(&self, collection: &str) -> Vec<T> {
        let Some(documents) = self.inner.documents.get(collection) else {
            return Vec::new();
        };

        documents
            .values()
            .filter(|doc| doc.get("is_active").and_then(Value::as_bool) == Some(true))
            .filter_map(|doc| decode(collection, doc))
            .collect()
    }

    fn decoded_visits(&self, user_id: &str) -> Vec<StationVisit> {
        self.inner
            .visits
            .get(user_id)
            .map(|docs| {
                docs.values()
                    .filter_map(|doc| decode(collections::VISITS, doc))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn publish_visits(&self, user_id: &str) {
        let change = VisitChange {
            user_id: user_id.to_string(),
            visits: self.decoded_visits(user_id),
        };
        self.inner.visit_changes.notify(&change);
    }
}

/// Consume one injected failure for `key`, if any.
fn take_failure(failures: &DashMap<String, u32>, key: &str) -> bool {
    let Some(mut remaining) = failures.get_mut(key) else {
        return false;
    };
    if *remaining == 0 {
        return false;
    }
    if *remaining != ALWAYS {
        *remaining -= 1;
    }
    true
}

fn decode<T: DeserializeOwned>(collection: &str, doc: &Value) -> Option<T> {
    match serde_json::from_value(doc.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(collection, error = %e, "Skipping undecodable document");
            None
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDb {
    async fn fetch_active_lines(&self) -> Result<Vec<Line>> {
        self.check_failure(collections::LINES)?;
        Ok(self.active(collections::LINES))
    }

    async fn fetch_active_stations(&self) -> Result<Vec<Station>> {
        self.check_failure(collections::STATIONS)?;
        Ok(self.active(collections::STATIONS))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.check_failure(collections::USERS)?;

        let Some(document) = self
            .inner
            .documents
            .get(collections::USERS)
            .and_then(|docs| docs.get(user_id).cloned())
        else {
            return Ok(None);
        };

        serde_json::from_value(document)
            .map(Some)
            .map_err(|e| AppError::Decode(e.to_string()))
    }

    async fn upsert_user(&self, user_id: &str, user: &User) -> Result<()> {
        self.check_failure(collections::USERS)?;
        let document = serde_json::to_value(user).map_err(|e| AppError::Internal(e.into()))?;
        self.put_raw(collections::USERS, user_id, document);
        Ok(())
    }

    async fn has_any_visits(&self, user_id: &str) -> Result<bool> {
        self.check_failure(collections::VISITS)?;
        Ok(self.visit_document_count(user_id) > 0)
    }

    async fn list_visits(&self, user_id: &str) -> Result<Vec<StationVisit>> {
        self.check_failure(collections::VISITS)?;
        Ok(self.decoded_visits(user_id))
    }

    async fn set_visit(&self, user_id: &str, visit: &StationVisit) -> Result<()> {
        self.check_failure(collections::VISITS)?;
        if take_failure(&self.inner.failing_visit_writes, &visit.station_id) {
            return Err(AppError::Network(format!(
                "Injected write failure for station {}",
                visit.station_id
            )));
        }

        let document_id = visit_document_id(&visit.station_id)?.to_string();
        let document = serde_json::to_value(visit).map_err(|e| AppError::Internal(e.into()))?;
        self.inner
            .visits
            .entry(user_id.to_string())
            .or_default()
            .insert(document_id, document);
        self.inner.visit_writes.fetch_add(1, Ordering::SeqCst);

        self.publish_visits(user_id);
        Ok(())
    }

    async fn delete_visit(&self, user_id: &str, station_id: &str) -> Result<()> {
        let document_id = visit_document_id(station_id)?;
        self.check_failure(collections::VISITS)?;
        if take_failure(&self.inner.failing_visit_writes, station_id) {
            return Err(AppError::Network(format!(
                "Injected delete failure for station {}",
                station_id
            )));
        }

        if let Some(mut docs) = self.inner.visits.get_mut(user_id) {
            docs.remove(document_id);
        }
        self.inner.visit_writes.fetch_add(1, Ordering::SeqCst);

        self.publish_visits(user_id);
        Ok(())
    }

    fn subscribe_visits(&self, user_id: &str, sink: VisitSink) -> Result<Subscription> {
        self.check_failure(collections::VISITS)?;

        let wanted = user_id.to_string();
        let feed_sink = sink.clone();
        let subscription = self.inner.visit_changes.subscribe(move |change| {
            if change.user_id == wanted {
                feed_sink(Ok(change.visits.clone()));
            }
        });

        sink(Ok(self.decoded_visits(user_id)));
        Ok(subscription)
    }
}
