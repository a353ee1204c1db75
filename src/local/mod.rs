// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device-local key-value storage.
//!
//! Holds the pre-cloud visit cache, the company filter selection and the
//! per-user migration flags. Values are either string arrays or booleans.

pub mod file;
pub mod memory;

pub use file::FileLocalStore;
pub use memory::MemoryLocalStore;

use serde::{Deserialize, Serialize};

/// Key names as constants.
pub mod keys {
    /// Visited station IDs recorded before cloud sync existed
    pub const VISITED_STATION_IDS: &str = "visitedStationIDs";
    /// Company filter selection
    pub const SELECTED_COMPANIES: &str = "selectedCompanies";

    /// Per-user flag set once local visits have been migrated.
    pub fn migration_completed(user_id: &str) -> String {
        format!("migrationCompleted_{}", user_id)
    }

    /// Per-user list of station IDs that could not be migrated.
    pub fn unmigrated_station_ids(user_id: &str) -> String {
        format!("unmigratedStationIDs_{}", user_id)
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalValue {
    Bool(bool),
    Strings(Vec<String>),
}

/// String-keyed storage of string arrays and booleans.
///
/// Reading a key holding the other value type behaves like a missing key.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<LocalValue>, LocalStoreError>;

    fn set(&self, key: &str, value: LocalValue) -> Result<(), LocalStoreError>;

    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;

    fn get_strings(&self, key: &str) -> Result<Option<Vec<String>>, LocalStoreError> {
        Ok(match self.get(key)? {
            Some(LocalValue::Strings(values)) => Some(values),
            _ => None,
        })
    }

    fn set_strings(&self, key: &str, values: Vec<String>) -> Result<(), LocalStoreError> {
        self.set(key, LocalValue::Strings(values))
    }

    /// Missing keys read as `false`.
    fn get_bool(&self, key: &str) -> Result<bool, LocalStoreError> {
        Ok(matches!(self.get(key)?, Some(LocalValue::Bool(true))))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), LocalStoreError> {
        self.set(key, LocalValue::Bool(value))
    }
}

/// Errors from local storage.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("Failed to access local store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Local store lock poisoned")]
    Poisoned,
}
