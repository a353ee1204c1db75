// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Station model.

use serde::{Deserialize, Serialize};

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A physical stop stored in the `stations` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Station {
    /// Station ID (e.g. "tokyo_shibuya"), also the document ID
    pub station_id: String,
    pub name: String,
    pub city_id: String,
    /// Lines serving this station (informational; lines own membership)
    #[serde(default)]
    pub line_ids: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub is_active: bool,
}

impl Station {
    /// Whether both coordinates are known.
    pub fn has_location(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}
