// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in flow tests: user setup, local visit migration and sync start.

use chrono::Utc;
use ekicho::db::memory::ALWAYS;
use ekicho::db::{collections, DocumentStore};
use ekicho::error::AppError;
use ekicho::local::{keys, LocalStore};
use ekicho::models::StationVisit;
use ekicho::services::{MigrationOutcome, SignInOutcome, SignedInUser};
use std::sync::Arc;

mod common;

fn cache_local_visits(local: &dyn LocalStore, station_ids: &[&str]) {
    local
        .set_strings(
            keys::VISITED_STATION_IDS,
            station_ids.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
}

#[tokio::test]
async fn test_local_visits_migrate_on_first_sign_in() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    cache_local_visits(app.local.as_ref(), &["A", "B"]);

    let outcome = app
        .state
        .session
        .handle_signed_in(&SignedInUser::new("u1"))
        .await
        .unwrap();

    let SignInOutcome::Migrated(report) = outcome else {
        panic!("expected migration, got {outcome:?}");
    };
    assert_eq!(report.outcome, MigrationOutcome::Migrated);
    assert_eq!(report.migrated, 2);

    assert_eq!(app.db.visit_station_ids("u1"), vec!["A", "B"]);
    assert!(app
        .local
        .get_bool(&keys::migration_completed("u1"))
        .unwrap());
    assert!(!app.local.contains(keys::VISITED_STATION_IDS));
    assert!(app.state.db.get_user("u1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_migration_skipped_when_cloud_has_visits() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    app.db
        .set_visit("u1", &StationVisit::new("u1", "C", Utc::now()))
        .await
        .unwrap();
    cache_local_visits(app.local.as_ref(), &["A"]);

    let outcome = app
        .state
        .session
        .handle_signed_in(&SignedInUser::new("u1"))
        .await
        .unwrap();

    assert_eq!(outcome, SignInOutcome::ExistingCloudData);
    assert_eq!(app.db.visit_station_ids("u1"), vec!["C"]);
    assert!(app.local.contains(keys::VISITED_STATION_IDS));
    assert!(!app
        .local
        .get_bool(&keys::migration_completed("u1"))
        .unwrap());
}

#[tokio::test]
async fn test_second_sign_in_writes_nothing() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    cache_local_visits(app.local.as_ref(), &["A"]);
    let user = SignedInUser::new("u1");

    app.state.session.handle_signed_in(&user).await.unwrap();
    let writes = app.db.visit_write_count();

    // Cloud emptied elsewhere and a stale cache reappears: the flag still wins.
    app.db.delete_visit("u1", "A").await.unwrap();
    cache_local_visits(app.local.as_ref(), &["B"]);
    let writes_after_delete = app.db.visit_write_count();
    assert_eq!(writes_after_delete, writes + 1);

    let outcome = app.state.session.handle_signed_in(&user).await.unwrap();

    let SignInOutcome::Migrated(report) = outcome else {
        panic!("expected migration check, got {outcome:?}");
    };
    assert_eq!(report.outcome, MigrationOutcome::AlreadyCompleted);
    assert_eq!(app.db.visit_write_count(), writes_after_delete);
}

#[tokio::test]
async fn test_sign_in_loads_migrated_visits() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    cache_local_visits(app.local.as_ref(), &["A"]);
    let user = SignedInUser::new("u1");
    app.state.identity.sign_in(user.clone());

    app.state.session.handle_signed_in(&user).await.unwrap();

    let state = app.state.sync.snapshot();
    assert_eq!(state.lines.len(), 1);
    assert!(state.is_visited("A"));
    assert!(app.state.sync.is_following_visits());
}

#[tokio::test]
async fn test_user_setup_failure_stops_flow() {
    let app = common::create_test_app();
    cache_local_visits(app.local.as_ref(), &["A"]);
    app.db.fail_collection(collections::USERS, ALWAYS);

    let result = app
        .state
        .session
        .handle_signed_in(&SignedInUser::new("u1"))
        .await;

    assert!(matches!(result, Err(AppError::Auth(msg)) if msg.starts_with("Failed to initialize user account")));
    assert_eq!(app.db.visit_write_count(), 0);
    assert!(app.local.contains(keys::VISITED_STATION_IDS));
}

#[tokio::test]
async fn test_unmigrated_ids_are_kept() {
    let app = common::create_test_app();
    cache_local_visits(app.local.as_ref(), &["A", "B"]);
    app.db.fail_visit_writes("A", ALWAYS);

    let outcome = app
        .state
        .session
        .handle_signed_in(&SignedInUser::new("u1"))
        .await
        .unwrap();

    let SignInOutcome::Migrated(report) = outcome else {
        panic!("expected migration, got {outcome:?}");
    };
    assert_eq!(report.failed, vec!["A"]);
    assert_eq!(
        app.local
            .get_strings(&keys::unmigrated_station_ids("u1"))
            .unwrap(),
        Some(vec!["A".to_string()])
    );
}

#[tokio::test]
async fn test_coordinator_follows_identity_changes() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    let coordinator = Arc::new(ekicho::services::SessionCoordinator::new(
        app.state.identity.clone(),
        app.state.sync.clone(),
        app.state.migration.clone(),
    ));
    let _watch = coordinator.start();

    app.state.identity.sign_in(SignedInUser::new("u1"));
    let sync = app.state.sync.clone();
    assert!(common::eventually(|| sync.is_following_visits()).await);

    app.state.identity.sign_out();
    assert!(common::eventually(|| !sync.is_following_visits()).await);
    assert_eq!(app.db.visit_subscriber_count(), 0);
}

#[tokio::test]
async fn test_sign_out_stamps_profile() {
    let app = common::create_test_app();
    let user = SignedInUser::new("u1");
    app.state.identity.sign_in(user.clone());
    app.state.session.handle_signed_in(&user).await.unwrap();

    app.state.session.sign_out().await;

    assert!(app.state.identity.current_user().is_none());
    let profile = app.state.db.get_user("u1").await.unwrap().unwrap();
    assert!(profile.last_signed_out_at.is_some());
}
