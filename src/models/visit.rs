// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Station visit model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's visit to a station, stored at `users/{uid}/visits/{station_id}`.
///
/// One document per (user, station); its existence means "visited".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationVisit {
    pub user_id: String,
    pub station_id: String,
    pub visited_at: DateTime<Utc>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub recommendation_text: Option<String>,
    pub recommendation_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl StationVisit {
    /// A private visit with no photos or recommendation.
    pub fn new(user_id: &str, station_id: &str, visited_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            station_id: station_id.to_string(),
            visited_at,
            photo_urls: Vec::new(),
            recommendation_text: None,
            recommendation_url: None,
            is_public: false,
            flagged: false,
            is_deleted: false,
        }
    }

    /// Whether this document counts as a visit (soft-deleted ones do not).
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}
