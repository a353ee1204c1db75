// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-time migration of device-local visits to the cloud.
//!
//! Runs at most once per user: a per-user flag in the local store marks
//! completion, after which every call is a no-op with zero writes.

use crate::db::DocumentStore;
use crate::error::Result;
use crate::local::{keys, LocalStore};
use crate::models::StationVisit;
use chrono::Utc;
use futures_util::{stream, StreamExt};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MAX_CONCURRENT_WRITES: usize = 16;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Where the migration state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    NotStarted,
    Checking,
    /// Flag already set, or nothing cached; always followed by `Completed`
    Skipped,
    Migrating,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    AlreadyCompleted,
    NothingToMigrate,
    Migrated,
}

/// Result of one migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub outcome: MigrationOutcome,
    /// Distinct station IDs found in the local cache
    pub attempted: usize,
    pub migrated: usize,
    /// Station IDs whose write failed on every attempt
    pub failed: Vec<String>,
}

impl MigrationReport {
    fn skipped(outcome: MigrationOutcome) -> Self {
        Self {
            outcome,
            attempted: 0,
            migrated: 0,
            failed: Vec::new(),
        }
    }

    /// True when at least one visit made it to the cloud.
    pub fn succeeded(&self) -> bool {
        self.migrated > 0
    }
}

pub struct MigrationService {
    db: Arc<dyn DocumentStore>,
    local: Arc<dyn LocalStore>,
    max_attempts: u32,
    phase: Mutex<MigrationPhase>,
}

impl MigrationService {
    pub fn new(db: Arc<dyn DocumentStore>, local: Arc<dyn LocalStore>, max_attempts: u32) -> Self {
        Self {
            db,
            local,
            max_attempts: max_attempts.max(1),
            phase: Mutex::new(MigrationPhase::NotStarted),
        }
    }

    pub fn phase(&self) -> MigrationPhase {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, phase: MigrationPhase) {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
    }

    fn finish_skipped(&self) {
        self.set_phase(MigrationPhase::Skipped);
        self.set_phase(MigrationPhase::Completed);
    }

    /// Copy cached station IDs into `users/{uid}/visits`.
    ///
    /// Callers must have confirmed the user has no remote visits. Once the
    /// writes settle the flag is set and the cache cleared whether or not
    /// every write succeeded; IDs that kept failing are kept under
    /// [`keys::unmigrated_station_ids`].
    pub async fn migrate_local_visits(&self, user_id: &str) -> Result<MigrationReport> {
        self.set_phase(MigrationPhase::Checking);

        let flag_key = keys::migration_completed(user_id);
        if self.local.get_bool(&flag_key)? {
            tracing::debug!(user_id, "Migration already completed");
            self.finish_skipped();
            return Ok(MigrationReport::skipped(MigrationOutcome::AlreadyCompleted));
        }

        let station_ids: BTreeSet<String> = self
            .local
            .get_strings(keys::VISITED_STATION_IDS)?
            .unwrap_or_default()
            .into_iter()
            .filter(|id| !id.is_empty())
            .collect();

        if station_ids.is_empty() {
            self.local.set_bool(&flag_key, true)?;
            tracing::debug!(user_id, "No local visits to migrate");
            self.finish_skipped();
            return Ok(MigrationReport::skipped(MigrationOutcome::NothingToMigrate));
        }

        self.set_phase(MigrationPhase::Migrating);
        let attempted = station_ids.len();
        tracing::info!(user_id, count = attempted, "Migrating local visits");

        let results: Vec<(String, Result<()>)> = stream::iter(station_ids)
            .map(move |station_id| async move {
                let result = self.write_with_retry(user_id, &station_id).await;
                (station_id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_WRITES)
            .collect()
            .await;

        let mut failed = Vec::new();
        for (station_id, result) in results {
            if let Err(e) = result {
                tracing::warn!(user_id, station_id = %station_id, error = %e, "Failed to migrate visit");
                failed.push(station_id);
            }
        }
        failed.sort();
        let migrated = attempted - failed.len();

        self.local.set_bool(&flag_key, true)?;
        self.local.remove(keys::VISITED_STATION_IDS)?;
        if !failed.is_empty() {
            self.local
                .set_strings(&keys::unmigrated_station_ids(user_id), failed.clone())?;
        }

        tracing::info!(
            user_id,
            migrated,
            attempted,
            "Migration completed: {}/{}",
            migrated,
            attempted
        );
        self.set_phase(MigrationPhase::Completed);

        Ok(MigrationReport {
            outcome: MigrationOutcome::Migrated,
            attempted,
            migrated,
            failed,
        })
    }

    async fn write_with_retry(&self, user_id: &str, station_id: &str) -> Result<()> {
        let mut attempt = 1;
        loop {
            let visit = StationVisit::new(user_id, station_id, Utc::now());
            match self.db.set_visit(user_id, &visit).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    tracing::debug!(station_id, attempt, error = %e, "Retrying visit write");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
