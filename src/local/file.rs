// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON-file backed local store.
//!
//! The whole map is rewritten on every change via a temp file and rename,
//! so a crash leaves either the old or the new contents on disk.

use super::{LocalStore, LocalStoreError, LocalValue};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct FileLocalStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, LocalValue>>,
}

impl FileLocalStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LocalStoreError> {
        let path = path.as_ref().to_path_buf();

        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened local store");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, LocalValue>) -> Result<(), LocalStoreError> {
        let json = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), LocalStoreError>
    where
        F: FnOnce(&mut BTreeMap<String, LocalValue>),
    {
        let mut values = self.values.lock().map_err(|_| LocalStoreError::Poisoned)?;
        // Memory only changes once the new contents are on disk
        let mut updated = values.clone();
        f(&mut updated);
        self.persist(&updated)?;
        *values = updated;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Result<Option<LocalValue>, LocalStoreError> {
        let values = self.values.lock().map_err(|_| LocalStoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: LocalValue) -> Result<(), LocalStoreError> {
        self.update(|values| {
            values.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}
