// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ekicho: track which train stations you have visited.
//!
//! This crate keeps a user's station visits in sync with a cloud document
//! database, migrates visits recorded before cloud sync existed, derives
//! progress and filter state, and serves it all over an HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod local;
pub mod middleware;
pub mod models;
pub mod observe;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use local::LocalStore;
use services::{
    IdentitySession, MigrationService, SessionCoordinator, SyncService, SyncSettings, ViewStore,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn DocumentStore>,
    pub local: Arc<dyn LocalStore>,
    pub identity: Arc<IdentitySession>,
    pub sync: Arc<SyncService>,
    pub migration: Arc<MigrationService>,
    pub view: ViewStore,
    pub session: SessionCoordinator,
}

impl AppState {
    /// Wire every service over the given stores.
    pub fn new(
        config: Config,
        db: Arc<dyn DocumentStore>,
        local: Arc<dyn LocalStore>,
        identity: Arc<IdentitySession>,
    ) -> Self {
        let sync = Arc::new(SyncService::new(
            db.clone(),
            identity.clone(),
            SyncSettings::from_config(&config),
        ));
        let migration = Arc::new(MigrationService::new(
            db.clone(),
            local.clone(),
            config.migration_max_attempts,
        ));
        let view = ViewStore::new(sync.clone(), local.clone());
        let session = SessionCoordinator::new(identity.clone(), sync.clone(), migration.clone());

        Self {
            config,
            db,
            local,
            identity,
            sync,
            migration,
            view,
            session,
        }
    }
}
