// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use ekicho::config::Config;
use ekicho::db::{FirestoreDb, MemoryDb};
use ekicho::local::MemoryLocalStore;
use ekicho::models::{Line, Station};
use ekicho::routes::create_router;
use ekicho::services::{IdTokenVerifier, IdentitySession};
use ekicho::AppState;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[allow(dead_code)]
pub const TEST_KID: &str = "test-kid";
#[allow(dead_code)]
pub const ID_TOKEN_SECRET: &[u8] = b"id_token_test_secret";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
        .with_listen_retry_delay(Duration::from_millis(100))
}

/// Everything a test needs to drive the app and inspect its stores.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub local: Arc<MemoryLocalStore>,
}

/// Create a test app over in-memory stores.
///
/// ID tokens minted by [`id_token`] are accepted by its verifier.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = MemoryDb::new();
    let local = Arc::new(MemoryLocalStore::new());

    let verifier = IdTokenVerifier::new_with_static_key(
        &config.gcp_project_id,
        TEST_KID,
        Algorithm::HS256,
        DecodingKey::from_secret(ID_TOKEN_SECRET),
    )
    .expect("Failed to build test verifier");
    let identity = Arc::new(IdentitySession::with_verifier(Arc::new(verifier)));

    let state = Arc::new(AppState::new(
        config,
        Arc::new(db.clone()),
        local.clone(),
        identity,
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        local,
    }
}

#[allow(dead_code)]
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Mint an ID token for `user_id` that the test verifier accepts.
#[allow(dead_code)]
pub fn id_token(user_id: &str) -> String {
    let now = now_secs();
    let claims = json!({
        "iss": "https://securetoken.google.com/test-project",
        "aud": "test-project",
        "sub": user_id,
        "iat": now,
        "auth_time": now,
        "exp": now + 3600,
        "name": "Test User",
        "email": "test@example.com",
        "firebase": { "sign_in_provider": "apple.com" }
    });

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(ID_TOKEN_SECRET)).unwrap()
}

/// Mint a session JWT as `/auth/session` would.
#[allow(dead_code)]
pub fn session_token(user_id: &str, signing_key: &[u8]) -> String {
    ekicho::middleware::auth::create_jwt(user_id, signing_key).unwrap()
}

#[allow(dead_code)]
pub fn line(id: &str, company: &str, station_ids: &[&str]) -> Line {
    Line {
        line_id: id.to_string(),
        name: format!("{} Line", id),
        company: company.to_string(),
        city_id: "tokyo".to_string(),
        line_symbol: String::new(),
        color_name: "green".to_string(),
        color_hex: "#9ACD32".to_string(),
        shape: "circle".to_string(),
        icon_asset_name: String::new(),
        station_ids: station_ids.iter().map(|s| s.to_string()).collect(),
        is_active: true,
    }
}

#[allow(dead_code)]
pub fn station(id: &str) -> Station {
    Station {
        station_id: id.to_string(),
        name: format!("{} Station", id),
        city_id: "tokyo".to_string(),
        line_ids: Vec::new(),
        lat: Some(35.68),
        lng: Some(139.76),
        is_active: true,
    }
}

/// Seed one line "L1" run by "JR East" with stations A and B.
#[allow(dead_code)]
pub fn seed_single_line(db: &MemoryDb) {
    db.put_line(&line("L1", "JR East", &["A", "B"]));
    db.put_station(&station("A"));
    db.put_station(&station("B"));
}

/// Seed two companies' lines sharing station B.
#[allow(dead_code)]
pub fn seed_two_companies(db: &MemoryDb) {
    db.put_line(&line("L1", "JR East", &["A", "B"]));
    db.put_line(&line("L2", "Tokyo Metro", &["B", "C"]));
    for id in ["A", "B", "C"] {
        db.put_station(&station(id));
    }
}

/// Poll `condition` until it holds or a second passes.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
