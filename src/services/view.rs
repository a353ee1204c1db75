// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived view state: progress, company filter and per-line counts.
//!
//! [`derive_view`] is a pure function of the sync state and the company
//! selection. [`ViewStore`] owns the selection, persists it in the local
//! store and republishes the view whenever either input changes.

use crate::error::{AppError, Result};
use crate::local::{keys, LocalStore};
use crate::models::Line;
use crate::observe::{Observers, Subscription};
use crate::services::sync::{SyncService, SyncState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Overall visited progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressInfo {
    pub visited_count: usize,
    pub total_count: usize,
    /// Fraction in `0.0..=1.0`
    pub percentage: f64,
}

/// A line with its visited count.
///
/// Both counts are over distinct station IDs, so a loop line that lists its
/// terminus twice still reaches 100%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LineProgress {
    pub line: Line,
    pub visited_count: usize,
    pub total_count: usize,
}

/// Everything a screen needs to render the line list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ViewState {
    pub progress: ProgressInfo,
    pub companies: Vec<String>,
    pub selected_companies: Vec<String>,
    /// Lines of the selected companies
    pub lines: Vec<LineProgress>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// One row of a line's station list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StationEntry {
    pub station_id: String,
    pub name: String,
    pub visited: bool,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Progress over every distinct station ID referenced by any line.
///
/// The company filter never changes the result, and neither does whether
/// the station documents themselves loaded.
pub fn total_progress(state: &SyncState) -> ProgressInfo {
    let visited = state.visited_station_ids();

    let referenced: HashSet<&str> = state
        .lines
        .iter()
        .flat_map(|l| l.station_ids.iter())
        .map(String::as_str)
        .collect();

    let total_count = referenced.len();
    let visited_count = referenced.iter().filter(|id| visited.contains(*id)).count();

    let percentage = if total_count == 0 {
        0.0
    } else {
        visited_count as f64 / total_count as f64
    };

    ProgressInfo {
        visited_count,
        total_count,
        percentage,
    }
}

pub fn derive_view(state: &SyncState, selected: &BTreeSet<String>) -> ViewState {
    let lines = state
        .filtered_lines(selected)
        .into_iter()
        .map(|line| LineProgress {
            visited_count: state.visited_count(&line),
            total_count: line.station_ids.iter().collect::<HashSet<_>>().len(),
            line,
        })
        .collect();

    ViewState {
        progress: total_progress(state),
        companies: state.all_companies(),
        selected_companies: selected.iter().cloned().collect(),
        lines,
        is_loading: state.is_loading,
        error: state.error.clone(),
    }
}

/// Stations of `line_id` in line order, skipping IDs with no loaded station.
pub fn stations_for_line(state: &SyncState, line_id: &str) -> Result<Vec<StationEntry>> {
    let line = state
        .lines
        .iter()
        .find(|l| l.line_id == line_id)
        .ok_or_else(|| AppError::NotFound(format!("Line {}", line_id)))?;

    Ok(line
        .station_ids
        .iter()
        .filter_map(|id| state.stations.get(id))
        .map(|station| StationEntry {
            station_id: station.station_id.clone(),
            name: station.name.clone(),
            visited: state.is_visited(&station.station_id),
            lat: station.lat,
            lng: station.lng,
        })
        .collect())
}

#[derive(Default)]
struct Selection {
    selected: BTreeSet<String>,
    /// Company list the selection was last reconciled against
    known_companies: Vec<String>,
}

struct ViewInner {
    local: Arc<dyn LocalStore>,
    selection: Mutex<Selection>,
    observers: Observers<ViewState>,
}

impl ViewInner {
    fn lock(&self) -> MutexGuard<'_, Selection> {
        self.selection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn on_sync_state(&self, state: &SyncState) {
        let companies = state.all_companies();
        let changed = self.lock().known_companies != companies;
        if changed {
            if let Err(e) = self.load_selected_companies(&companies) {
                tracing::warn!(error = %e, "Failed to load company selection");
            }
        }
        self.publish(state);
    }

    /// Reconcile the saved selection with `companies` and save the result.
    fn load_selected_companies(&self, companies: &[String]) -> Result<()> {
        let mut selection = self.lock();
        selection.known_companies = companies.to_vec();
        if companies.is_empty() {
            return Ok(());
        }

        let saved = self.local.get_strings(keys::SELECTED_COMPANIES)?;
        let mut selected: BTreeSet<String> = saved
            .unwrap_or_default()
            .into_iter()
            .filter(|c| companies.contains(c))
            .collect();
        if selected.is_empty() {
            selected = companies.iter().cloned().collect();
        }

        tracing::debug!(selected = selected.len(), total = companies.len(), "Loaded company selection");
        self.save(&selected)?;
        selection.selected = selected;
        Ok(())
    }

    fn save(&self, selected: &BTreeSet<String>) -> Result<()> {
        self.local
            .set_strings(keys::SELECTED_COMPANIES, selected.iter().cloned().collect())?;
        Ok(())
    }

    fn publish(&self, state: &SyncState) -> ViewState {
        let view = derive_view(state, &self.lock().selected);
        self.observers.notify(&view);
        view
    }
}

/// Holds the company selection and publishes [`ViewState`] updates.
pub struct ViewStore {
    sync: Arc<SyncService>,
    inner: Arc<ViewInner>,
    _sync_subscription: Subscription,
}

impl ViewStore {
    pub fn new(sync: Arc<SyncService>, local: Arc<dyn LocalStore>) -> Self {
        let inner = Arc::new(ViewInner {
            local,
            selection: Mutex::new(Selection::default()),
            observers: Observers::new(),
        });

        let observer = inner.clone();
        let sync_subscription = sync.subscribe(move |state| observer.on_sync_state(state));

        // Pick up anything loaded before we subscribed.
        let state = sync.snapshot();
        if let Err(e) = inner.load_selected_companies(&state.all_companies()) {
            tracing::warn!(error = %e, "Failed to load company selection");
        }

        Self {
            sync,
            inner,
            _sync_subscription: sync_subscription,
        }
    }

    pub fn view(&self) -> ViewState {
        derive_view(&self.sync.snapshot(), &self.inner.lock().selected)
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ViewState) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(callback)
    }

    pub fn selected_companies(&self) -> BTreeSet<String> {
        self.inner.lock().selected.clone()
    }

    /// Re-read the saved selection against the current company list.
    ///
    /// Does nothing while no companies are known.
    pub fn load_selected_companies(&self) -> Result<ViewState> {
        let state = self.sync.snapshot();
        self.inner.load_selected_companies(&state.all_companies())?;
        Ok(self.inner.publish(&state))
    }

    pub fn toggle_company(&self, company: &str) -> Result<ViewState> {
        let state = self.sync.snapshot();
        if !state.all_companies().iter().any(|c| c == company) {
            return Err(AppError::NotFound(format!("Company {}", company)));
        }

        {
            let mut selection = self.inner.lock();
            if !selection.selected.remove(company) {
                selection.selected.insert(company.to_string());
            }
            self.inner.save(&selection.selected)?;
        }

        Ok(self.inner.publish(&state))
    }

    /// Select nothing when everything is selected, otherwise everything.
    pub fn toggle_all_companies(&self) -> Result<ViewState> {
        let state = self.sync.snapshot();
        let companies = state.all_companies();

        {
            let mut selection = self.inner.lock();
            if selection.selected.len() == companies.len() {
                selection.selected.clear();
            } else {
                selection.selected = companies.into_iter().collect();
            }
            self.inner.save(&selection.selected)?;
        }

        Ok(self.inner.publish(&state))
    }

    pub fn stations_for_line(&self, line_id: &str) -> Result<Vec<StationEntry>> {
        stations_for_line(&self.sync.snapshot(), line_id)
    }

    /// Toggle a station's visit; returns whether it is now visited.
    pub async fn toggle_visited(&self, station_id: &str) -> Result<bool> {
        self.sync.toggle_visit(station_id).await
    }

    pub async fn refresh(&self) -> ViewState {
        self.sync.load_all().await;
        self.view()
    }
}
