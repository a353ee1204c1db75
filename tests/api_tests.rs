// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end API tests: sign in with an ID token, then drive the view.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use ekicho::local::{keys, LocalStore};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(router: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

/// Sign `user_id` in through `/auth/session` and return the session token.
async fn sign_in(router: &Router, user_id: &str) -> Value {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "id_token": common::id_token(user_id) }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("ekicho_session=")));
    body_json(response).await
}

#[tokio::test]
async fn test_sign_in_creates_user_and_migrates() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    app.local
        .set_strings(keys::VISITED_STATION_IDS, vec!["A".to_string()])
        .unwrap();

    let session = sign_in(&app.router, "u1").await;
    assert_eq!(session["user_id"], "u1");
    assert_eq!(session["migrated_visits"], 1);
    let token = session["token"].as_str().unwrap();

    let me = body_json(send(&app.router, "GET", "/api/me", token, None).await).await;
    assert_eq!(me["display_name"], "Test User");
    assert_eq!(me["current_city_id"], "tokyo");

    let state = body_json(send(&app.router, "GET", "/api/state", token, None).await).await;
    assert_eq!(state["progress"]["visited_count"], 1);
    assert_eq!(state["progress"]["total_count"], 2);
}

#[tokio::test]
async fn test_toggle_visit_round_trip() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    let session = sign_in(&app.router, "u1").await;
    let token = session["token"].as_str().unwrap();

    let response = send(&app.router, "POST", "/api/visits/A/toggle", token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let toggled = body_json(response).await;
    assert_eq!(toggled["visited"], true);
    assert_eq!(toggled["state"]["progress"]["percentage"], 0.5);

    let toggled =
        body_json(send(&app.router, "POST", "/api/visits/A/toggle", token, None).await).await;
    assert_eq!(toggled["visited"], false);
    assert_eq!(toggled["state"]["progress"]["visited_count"], 0);
    assert_eq!(app.db.visit_document_count("u1"), 0);
}

#[tokio::test]
async fn test_line_stations() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    let session = sign_in(&app.router, "u1").await;
    let token = session["token"].as_str().unwrap();
    send(&app.router, "POST", "/api/visits/B/toggle", token, None).await;

    let stations =
        body_json(send(&app.router, "GET", "/api/lines/L1/stations", token, None).await).await;
    assert_eq!(stations[0]["station_id"], "A");
    assert_eq!(stations[0]["visited"], false);
    assert_eq!(stations[1]["visited"], true);

    let missing = send(&app.router, "GET", "/api/lines/L9/stations", token, None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_company_toggles() {
    let app = common::create_test_app();
    common::seed_two_companies(&app.db);
    let session = sign_in(&app.router, "u1").await;
    let token = session["token"].as_str().unwrap();

    let view = body_json(
        send(&app.router, "POST", "/api/companies/JR%20East/toggle", token, None).await,
    )
    .await;
    assert_eq!(view["selected_companies"], json!(["Tokyo Metro"]));
    assert_eq!(view["lines"].as_array().unwrap().len(), 1);

    let view = body_json(
        send(&app.router, "POST", "/api/companies/toggle-all", token, None).await,
    )
    .await;
    assert_eq!(view["selected_companies"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_city() {
    let app = common::create_test_app();
    let session = sign_in(&app.router, "u1").await;
    let token = session["token"].as_str().unwrap();

    let response = send(
        &app.router,
        "PUT",
        "/api/me/city",
        token,
        Some(json!({ "city_id": "osaka" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["current_city_id"], "osaka");

    let response = send(
        &app.router,
        "PUT",
        "/api/me/city",
        token,
        Some(json!({ "city_id": "" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_picks_up_new_lines() {
    let app = common::create_test_app();
    common::seed_single_line(&app.db);
    let session = sign_in(&app.router, "u1").await;
    let token = session["token"].as_str().unwrap();

    app.db.put_line(&common::line("L2", "Tokyo Metro", &["B"]));
    let view = body_json(send(&app.router, "POST", "/api/refresh", token, None).await).await;

    assert_eq!(view["companies"], json!(["JR East", "Tokyo Metro"]));
}

#[tokio::test]
async fn test_invalid_id_token_rejected() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "id_token": "not-a-jwt" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "auth_error");
    assert!(app.state.identity.current_user().is_none());
}

#[tokio::test]
async fn test_empty_id_token_is_bad_request() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "id_token": "" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
