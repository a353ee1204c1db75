// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which document database backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStoreKind {
    /// Cloud Firestore (or the emulator when FIRESTORE_EMULATOR_HOST is set)
    Firestore,
    /// In-process store, for local development without a project
    Memory,
}

impl FromStr for DocumentStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid("DOCUMENT_STORE", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP / Firebase project ID (also the expected ID token audience)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// UI shell origin allowed by CORS
    pub frontend_url: String,
    /// HS256 key for local session cookies (raw bytes)
    pub session_signing_key: Vec<u8>,
    /// Path of the JSON file backing the local key-value store
    pub local_store_path: PathBuf,
    pub document_store: DocumentStoreKind,
    /// Delay before a dropped Firestore visit listener reconnects
    pub visit_listen_retry_delay: Duration,
    /// Attempts per visit document during local-to-cloud migration
    pub migration_max_attempts: u32,
    /// City assigned to newly created user documents
    pub default_city_id: String,
    /// Auth provider tag written to newly created user documents
    pub auth_provider: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
            local_store_path: PathBuf::from("ekicho_local.json"),
            document_store: DocumentStoreKind::Memory,
            visit_listen_retry_delay: Duration::from_secs(5),
            migration_max_attempts: 3,
            default_city_id: "tokyo".to_string(),
            auth_provider: "apple".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .trim()
                .as_bytes()
                .to_vec(),
            local_store_path: env::var("LOCAL_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ekicho_local.json")),
            document_store: env::var("DOCUMENT_STORE")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,
            visit_listen_retry_delay: Duration::from_secs(parse_or(
                "VISIT_LISTEN_RETRY_SECS",
                5u64,
            )?),
            migration_max_attempts: parse_or("MIGRATION_MAX_ATTEMPTS", 3u32)?.max(1),
            default_city_id: env::var("DEFAULT_CITY_ID").unwrap_or_else(|_| "tokyo".to_string()),
            auth_provider: env::var("AUTH_PROVIDER").unwrap_or_else(|_| "apple".to_string()),
        })
    }
}

/// Parse an optional numeric variable, rejecting values that are set but malformed.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("GCP_PROJECT_ID", "ekicho-test");
        env::set_var("SESSION_SIGNING_KEY", " test_session_key_32_bytes_min!!! ");
        env::set_var("DOCUMENT_STORE", "memory");
        env::set_var("MIGRATION_MAX_ATTEMPTS", "0");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.gcp_project_id, "ekicho-test");
        assert_eq!(config.session_signing_key, b"test_session_key_32_bytes_min!!!");
        assert_eq!(config.document_store, DocumentStoreKind::Memory);
        assert_eq!(config.migration_max_attempts, 1);
        assert_eq!(config.default_city_id, "tokyo");
    }

    #[test]
    fn test_document_store_kind_parse() {
        assert_eq!(
            "Firestore".parse::<DocumentStoreKind>().unwrap(),
            DocumentStoreKind::Firestore
        );
        assert!(matches!(
            "postgres".parse::<DocumentStoreKind>(),
            Err(ConfigError::Invalid("DOCUMENT_STORE", _))
        ));
    }
}
