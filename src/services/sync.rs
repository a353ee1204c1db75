// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync service: in-memory mirror of lines, stations and the user's visits.
//!
//! Every state change goes through [`SyncEvent`] and one reducer. Observers
//! are notified after the lock is released, with a snapshot of the new state.

use crate::config::Config;
use crate::db::{DocumentStore, VisitSink};
use crate::error::{AppError, Result};
use crate::models::{Line, Station, StationVisit, User};
use crate::observe::{Observers, Subscription};
use crate::services::identity::{IdentitySession, SignedInUser};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Snapshot of everything the service mirrors.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Active lines in the order the database returned them
    pub lines: Vec<Line>,
    /// Active stations keyed by station ID
    pub stations: HashMap<String, Station>,
    /// The user's visit documents keyed by station ID
    pub visits: HashMap<String, StationVisit>,
    pub is_loading: bool,
    /// Last user-visible error message
    pub error: Option<String>,
}

impl SyncState {
    pub fn is_visited(&self, station_id: &str) -> bool {
        self.visits.get(station_id).is_some_and(StationVisit::is_live)
    }

    /// Station IDs with a live visit document.
    pub fn visited_station_ids(&self) -> HashSet<&str> {
        self.visits
            .values()
            .filter(|v| v.is_live())
            .map(|v| v.station_id.as_str())
            .collect()
    }

    /// Sorted, de-duplicated company names of all lines.
    pub fn all_companies(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|l| l.company_name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Lines whose company is selected.
    ///
    /// Selecting every company yields the unfiltered list in its original
    /// order; selecting nothing yields nothing.
    pub fn filtered_lines(&self, selected: &BTreeSet<String>) -> Vec<Line> {
        if selected.is_empty() {
            return Vec::new();
        }
        if selected.len() == self.all_companies().len() {
            return self.lines.clone();
        }
        self.lines
            .iter()
            .filter(|l| selected.contains(l.company_name()))
            .cloned()
            .collect()
    }

    /// Visited stations on `line`.
    pub fn visited_count(&self, line: &Line) -> usize {
        line.station_ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|id| self.is_visited(id))
            .count()
    }
}

/// A state transition.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    LoadStarted,
    LinesLoaded(Vec<Line>),
    StationsLoaded(Vec<Station>),
    LoadFinished,
    /// Full replacement snapshot from the visit subscription
    VisitsReplaced(Vec<StationVisit>),
    VisitAdded(StationVisit),
    VisitRemoved(String),
    Failed(String),
    /// User-scoped state is dropped
    SignedOut,
}

fn reduce(state: &mut SyncState, event: SyncEvent) {
    match event {
        SyncEvent::LoadStarted => {
            state.is_loading = true;
            state.error = None;
        }
        SyncEvent::LinesLoaded(lines) => state.lines = lines,
        SyncEvent::StationsLoaded(stations) => {
            state.stations = stations
                .into_iter()
                .map(|s| (s.station_id.clone(), s))
                .collect();
        }
        SyncEvent::LoadFinished => state.is_loading = false,
        SyncEvent::VisitsReplaced(visits) => {
            state.visits = visits
                .into_iter()
                .map(|v| (v.station_id.clone(), v))
                .collect();
        }
        SyncEvent::VisitAdded(visit) => {
            state.visits.insert(visit.station_id.clone(), visit);
        }
        SyncEvent::VisitRemoved(station_id) => {
            state.visits.remove(&station_id);
        }
        SyncEvent::Failed(message) => state.error = Some(message),
        SyncEvent::SignedOut => {
            state.visits.clear();
            state.error = None;
        }
    }
}

struct StateStore {
    state: Mutex<SyncState>,
    observers: Observers<SyncState>,
}

impl StateStore {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, event: SyncEvent) {
        let snapshot = {
            let mut state = self.lock();
            reduce(&mut state, event);
            state.clone()
        };
        self.observers.notify(&snapshot);
    }

    fn fail(&self, message: String) {
        tracing::warn!(error = %message, "Sync error");
        self.apply(SyncEvent::Failed(message));
    }
}

/// Profile defaults for first sign-in.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub auth_provider: String,
    pub default_city_id: String,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth_provider: config.auth_provider.clone(),
            default_city_id: config.default_city_id.clone(),
        }
    }
}

/// Mirrors remote collections and applies the user's visit toggles.
pub struct SyncService {
    db: Arc<dyn DocumentStore>,
    identity: Arc<IdentitySession>,
    settings: SyncSettings,
    store: Arc<StateStore>,
    visit_subscription: Mutex<Option<Subscription>>,
}

impl SyncService {
    pub fn new(
        db: Arc<dyn DocumentStore>,
        identity: Arc<IdentitySession>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            db,
            identity,
            settings,
            store: Arc::new(StateStore {
                state: Mutex::new(SyncState::default()),
                observers: Observers::new(),
            }),
            visit_subscription: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SyncState {
        self.store.lock().clone()
    }

    /// Observe every state transition.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        self.store.observers.subscribe(callback)
    }

    pub fn identity(&self) -> &Arc<IdentitySession> {
        &self.identity
    }

    // ─── Loading ─────────────────────────────────────────────────

    /// Fetch lines and stations concurrently, then follow the user's visits.
    ///
    /// A failed fetch leaves its collection empty and records a message; it
    /// does not abort the other fetch.
    pub async fn load_all(&self) {
        self.store.apply(SyncEvent::LoadStarted);

        let (lines, stations) = tokio::join!(
            self.db.fetch_active_lines(),
            self.db.fetch_active_stations()
        );

        match lines {
            Ok(lines) => {
                tracing::info!(count = lines.len(), "Loaded lines");
                self.store.apply(SyncEvent::LinesLoaded(lines));
            }
            Err(e) => {
                self.store.apply(SyncEvent::LinesLoaded(Vec::new()));
                self.store.fail(format!("Failed to load lines: {}", e));
            }
        }

        match stations {
            Ok(stations) => {
                tracing::info!(count = stations.len(), "Loaded stations");
                self.store.apply(SyncEvent::StationsLoaded(stations));
            }
            Err(e) => {
                self.store.apply(SyncEvent::StationsLoaded(Vec::new()));
                self.store.fail(format!("Failed to load stations: {}", e));
            }
        }

        self.store.apply(SyncEvent::LoadFinished);

        match self.identity.current_user_id() {
            Some(user_id) => self.follow_visits(&user_id),
            None => tracing::debug!("No signed-in user, skipping visit subscription"),
        }
    }

    /// Replace any running visit subscription with one for `user_id`.
    fn follow_visits(&self, user_id: &str) {
        // Stop the old feed before the new one delivers its first snapshot.
        drop(self.take_visit_subscription());

        let store = self.store.clone();
        let sink: VisitSink = Arc::new(move |snapshot| match snapshot {
            Ok(visits) => store.apply(SyncEvent::VisitsReplaced(visits)),
            Err(e) => store.fail(format!("Failed to load user visits: {}", e)),
        });

        match self.db.subscribe_visits(user_id, sink) {
            Ok(subscription) => {
                *lock_subscription(&self.visit_subscription) = Some(subscription);
            }
            Err(e) => self
                .store
                .fail(format!("Failed to load user visits: {}", e)),
        }
    }

    fn take_visit_subscription(&self) -> Option<Subscription> {
        lock_subscription(&self.visit_subscription).take()
    }

    pub fn is_following_visits(&self) -> bool {
        lock_subscription(&self.visit_subscription).is_some()
    }

    /// Cancel the visit feed and drop user-scoped state.
    pub fn stop(&self) {
        if let Some(subscription) = self.take_visit_subscription() {
            subscription.cancel();
            tracing::debug!("Visit subscription cancelled");
        }
        self.store.apply(SyncEvent::SignedOut);
    }

    // ─── Visits ──────────────────────────────────────────────────

    fn require_user(&self) -> Result<String> {
        self.identity.current_user_id().ok_or_else(|| {
            self.store.fail("User not authenticated".to_string());
            AppError::NotAuthenticated
        })
    }

    /// Flip the visited state of a station; returns the new state.
    ///
    /// Local state changes only after the remote write succeeds.
    pub async fn toggle_visit(&self, station_id: &str) -> Result<bool> {
        let user_id = self.require_user()?;
        let visited = self.store.lock().is_visited(station_id);

        if visited {
            if let Err(e) = self.db.delete_visit(&user_id, station_id).await {
                self.store.fail(format!("Failed to remove visit: {}", e));
                return Err(e);
            }
            self.store
                .apply(SyncEvent::VisitRemoved(station_id.to_string()));
            tracing::debug!(user_id = %user_id, station_id, "Visit removed");
            Ok(false)
        } else {
            let visit = StationVisit::new(&user_id, station_id, Utc::now());
            if let Err(e) = self.db.set_visit(&user_id, &visit).await {
                self.store.fail(format!("Failed to add visit: {}", e));
                return Err(e);
            }
            self.store.apply(SyncEvent::VisitAdded(visit));
            tracing::debug!(user_id = %user_id, station_id, "Visit added");
            Ok(true)
        }
    }

    /// Whether the user has at least one visit document. Errors count as "no".
    pub async fn has_any_visits(&self, user_id: &str) -> bool {
        match self.db.has_any_visits(user_id).await {
            Ok(any) => any,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Visit existence check failed");
                false
            }
        }
    }

    // ─── User Profile ────────────────────────────────────────────

    /// Read `users/{uid}`, creating it with defaults on first sign-in.
    pub async fn create_user_if_needed(&self, user: &SignedInUser) -> Result<User> {
        if let Some(existing) = self.db.get_user(&user.user_id).await? {
            return Ok(existing);
        }

        let profile = User::new_profile(
            user.display_name.as_deref(),
            user.email.as_deref(),
            &self.settings.auth_provider,
            &self.settings.default_city_id,
            Utc::now(),
        );
        self.db.upsert_user(&user.user_id, &profile).await?;

        tracing::info!(user_id = %user.user_id, "Created user document");
        Ok(profile)
    }

    pub async fn current_profile(&self) -> Result<User> {
        let user_id = self.identity.current_user_id().ok_or(AppError::NotAuthenticated)?;
        self.db
            .get_user(&user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
    }

    pub async fn update_current_city(&self, city_id: &str) -> Result<User> {
        let user_id = self.identity.current_user_id().ok_or(AppError::NotAuthenticated)?;
        let mut user = self.current_profile().await?;

        user.current_city_id = city_id.to_string();
        user.last_active_at = Some(Utc::now());
        self.db.upsert_user(&user_id, &user).await?;

        tracing::info!(user_id = %user_id, city_id, "Updated current city");
        Ok(user)
    }

    /// Stamp `last_signed_out_at` on the current user's document.
    pub async fn record_sign_out(&self) -> Result<()> {
        let user_id = self.identity.current_user_id().ok_or(AppError::NotAuthenticated)?;
        let mut user = self.current_profile().await?;

        user.last_signed_out_at = Some(Utc::now());
        self.db.upsert_user(&user_id, &user).await
    }
}

fn lock_subscription(slot: &Mutex<Option<Subscription>>) -> MutexGuard<'_, Option<Subscription>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
