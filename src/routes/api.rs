// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::User;
use crate::services::{StationEntry, ViewState};
use crate::time_utils::format_optional_utc;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via session JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/city", put(update_city))
        .route("/api/state", get(get_state))
        .route("/api/lines/{line_id}/stations", get(get_line_stations))
        .route("/api/visits/{station_id}/toggle", post(toggle_visit))
        .route("/api/companies/toggle-all", post(toggle_all_companies))
        .route("/api/companies/{company}/toggle", post(toggle_company))
        .route("/api/refresh", post(refresh))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub auth_provider: String,
    pub current_city_id: String,
    pub home_stations: HashMap<String, String>,
    pub created_at: Option<String>,
    pub last_active_at: Option<String>,
}

impl UserResponse {
    fn new(user_id: String, user: User) -> Self {
        Self {
            user_id,
            display_name: user.display_name,
            email: user.email,
            auth_provider: user.auth_provider,
            current_city_id: user.current_city_id,
            home_stations: user.home_stations,
            created_at: format_optional_utc(user.created_at),
            last_active_at: format_optional_utc(user.last_active_at),
        }
    }
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state.sync.current_profile().await?;
    Ok(Json(UserResponse::new(user.user_id, profile)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CityRequest {
    #[validate(length(min = 1, max = 64, message = "city_id must be 1-64 characters"))]
    pub city_id: String,
}

async fn update_city(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CityRequest>,
) -> Result<Json<UserResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let profile = state.sync.update_current_city(&body.city_id).await?;
    Ok(Json(UserResponse::new(user.user_id, profile)))
}

// ─── View State ──────────────────────────────────────────────

async fn get_state(State(state): State<Arc<AppState>>) -> Json<ViewState> {
    Json(state.view.view())
}

async fn get_line_stations(
    State(state): State<Arc<AppState>>,
    Path(line_id): Path<String>,
) -> Result<Json<Vec<StationEntry>>> {
    Ok(Json(state.view.stations_for_line(&line_id)?))
}

async fn refresh(State(state): State<Arc<AppState>>) -> Json<ViewState> {
    Json(state.view.refresh().await)
}

// ─── Visits ──────────────────────────────────────────────────

/// Result of a visit toggle.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ToggleVisitResponse {
    pub station_id: String,
    pub visited: bool,
    pub state: ViewState,
}

async fn toggle_visit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(station_id): Path<String>,
) -> Result<Json<ToggleVisitResponse>> {
    let visited = state.view.toggle_visited(&station_id).await?;

    tracing::info!(user_id = %user.user_id, station_id = %station_id, visited, "Visit toggled");

    Ok(Json(ToggleVisitResponse {
        station_id,
        visited,
        state: state.view.view(),
    }))
}

// ─── Company Filter ──────────────────────────────────────────

async fn toggle_company(
    State(state): State<Arc<AppState>>,
    Path(company): Path<String>,
) -> Result<Json<ViewState>> {
    Ok(Json(state.view.toggle_company(&company)?))
}

async fn toggle_all_companies(State(state): State<Arc<AppState>>) -> Result<Json<ViewState>> {
    Ok(Json(state.view.toggle_all_companies()?))
}
