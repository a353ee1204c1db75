// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: exchange a provider ID token for a session, and sign out.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::services::SignInOutcome;
use crate::AppState;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/session", post(create_session))
        .route("/auth/logout", post(logout))
}

/// Sign-in request body.
#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    #[validate(length(min = 1, message = "id_token must not be empty"))]
    pub id_token: String,
}

/// Sign-in response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub user_id: String,
    /// Bearer token for clients that do not keep cookies
    pub token: String,
    /// Number of local visits copied to the cloud during this sign-in
    pub migrated_visits: usize,
}

fn session_cookie(frontend_url: &str, value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(!is_local_origin(frontend_url))
        .same_site(SameSite::Lax)
        .build()
}

fn is_local_origin(url: &str) -> bool {
    url.starts_with("http://localhost") || url.starts_with("http://127.0.0.1")
}

/// Verify the ID token, run the sign-in flow and set the session cookie.
async fn create_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<SessionRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (user, outcome) = state.session.sign_in_with_id_token(&body.id_token).await?;

    let migrated_visits = match &outcome {
        SignInOutcome::Migrated(report) => report.migrated,
        SignInOutcome::ExistingCloudData => 0,
    };

    let token = create_jwt(&user.user_id, &state.config.session_signing_key)?;

    tracing::info!(
        user_id = %user.user_id,
        migrated_visits,
        "Session created"
    );

    let jar = jar.add(session_cookie(&state.config.frontend_url, token.clone()));
    Ok((
        jar,
        Json(SessionResponse {
            user_id: user.user_id,
            token,
            migrated_visits,
        }),
    ))
}

/// Sign out and clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    state.session.sign_out().await;

    let jar = jar.remove(session_cookie(&state.config.frontend_url, String::new()));
    (jar, StatusCode::NO_CONTENT)
}
