// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User profile stored at `users/{uid}`.
///
/// The document ID is the identity provider's user ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    /// Identity provider tag (e.g. "apple")
    pub auth_provider: String,
    pub current_city_id: String,
    /// Home station per city, e.g. {"tokyo": "tokyo_monzen-nakacho"}
    #[serde(default)]
    pub home_stations: HashMap<String, String>,
    /// Labelled stations per city, e.g. {"tokyo": {"work": "tokyo_roppongi"}}
    #[serde(default)]
    pub auxiliary_stations: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    /// Stamped when the user signs out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signed_out_at: Option<DateTime<Utc>>,
}

impl User {
    /// A fresh profile for a first sign-in.
    pub fn new_profile(
        display_name: Option<&str>,
        email: Option<&str>,
        auth_provider: &str,
        city_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            display_name: display_name
                .filter(|n| !n.is_empty())
                .unwrap_or("User")
                .to_string(),
            email: email.unwrap_or_default().to_string(),
            auth_provider: auth_provider.to_string(),
            current_city_id: city_id.to_string(),
            home_stations: HashMap::new(),
            auxiliary_stations: HashMap::new(),
            created_at: Some(now),
            last_active_at: Some(now),
            last_signed_out_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults() {
        let now = Utc::now();
        let user = User::new_profile(None, None, "apple", "tokyo", now);

        assert_eq!(user.display_name, "User");
        assert_eq!(user.email, "");
        assert_eq!(user.current_city_id, "tokyo");
        assert!(user.home_stations.is_empty());
        assert_eq!(user.created_at, Some(now));
        assert_eq!(user.last_active_at, Some(now));
    }

    #[test]
    fn test_new_profile_keeps_provider_name() {
        let user = User::new_profile(
            Some("Daniele"),
            Some("d@example.com"),
            "apple",
            "osaka",
            Utc::now(),
        );
        assert_eq!(user.display_name, "Daniele");
        assert_eq!(user.email, "d@example.com");
        assert_eq!(user.current_city_id, "osaka");
    }
}
