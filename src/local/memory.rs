// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory local store, for tests and ephemeral sessions.

use super::{LocalStore, LocalStoreError, LocalValue};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: DashMap<String, LocalValue>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<LocalValue>, LocalStoreError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: LocalValue) -> Result<(), LocalStoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.values.remove(key);
        Ok(())
    }
}
