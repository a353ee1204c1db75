// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! FIRESTORE_EMULATOR_HOST to point at it. Each test uses its own user ID.

use chrono::Utc;
use ekicho::db::DocumentStore;
use ekicho::models::{StationVisit, User};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;
use common::test_db;

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-user-{}", nanos)
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.get_user(&user_id).await.unwrap().is_none());

    let user = User::new_profile(Some("Test"), None, "apple", "tokyo", Utc::now());
    db.upsert_user(&user_id, &user).await.unwrap();

    let fetched = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.display_name, "Test");
    assert_eq!(fetched.current_city_id, "tokyo");
    assert!(fetched.home_stations.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// VISIT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_visit_set_list_delete() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(!db.has_any_visits(&user_id).await.unwrap());

    let visit = StationVisit::new(&user_id, "tokyo_shibuya", Utc::now());
    db.set_visit(&user_id, &visit).await.unwrap();
    // Same station again overwrites the document
    db.set_visit(&user_id, &visit).await.unwrap();

    assert!(db.has_any_visits(&user_id).await.unwrap());
    let visits = db.list_visits(&user_id).await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].station_id, "tokyo_shibuya");

    db.delete_visit(&user_id, "tokyo_shibuya").await.unwrap();
    assert!(db.list_visits(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_visit_subscription_sees_writes() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let snapshots: Arc<Mutex<Vec<usize>>> = Arc::default();

    let s = snapshots.clone();
    let subscription = db
        .subscribe_visits(
            &user_id,
            Arc::new(move |snapshot| {
                if let Ok(visits) = snapshot {
                    s.lock().unwrap().push(visits.len());
                }
            }),
        )
        .unwrap();

    db.set_visit(&user_id, &StationVisit::new(&user_id, "A", Utc::now()))
        .await
        .unwrap();

    assert!(
        wait_for_last(&snapshots, 1).await,
        "subscription never reported the new visit"
    );

    db.delete_visit(&user_id, "A").await.unwrap();
    assert!(
        wait_for_last(&snapshots, 0).await,
        "subscription never reported the deletion"
    );

    subscription.cancel();
}

async fn wait_for_last(snapshots: &Mutex<Vec<usize>>, expected: usize) -> bool {
    for _ in 0..50 {
        if snapshots.lock().unwrap().last() == Some(&expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
