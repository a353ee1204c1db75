// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transit line model.

use serde::{Deserialize, Serialize};

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Company name used when a line has none recorded.
pub const OTHER_COMPANY: &str = "Other";

/// A transit line stored in the `lines` collection.
///
/// Documents are authored externally; the app only reads active ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Line {
    /// Line ID (e.g. "tokyo_yamanote"), also the document ID
    pub line_id: String,
    /// Display name
    pub name: String,
    /// Operating company (may be empty)
    #[serde(default)]
    pub company: String,
    pub city_id: String,
    /// Short line symbol (e.g. "JY"), empty when the line has none
    #[serde(default)]
    pub line_symbol: String,
    #[serde(default)]
    pub color_name: String,
    #[serde(default)]
    pub color_hex: String,
    /// Badge shape ("circle" or "roundedRectangle")
    #[serde(default)]
    pub shape: String,
    #[serde(default)]
    pub icon_asset_name: String,
    /// Ordered station references; authoritative line membership
    pub station_ids: Vec<String>,
    pub is_active: bool,
}

impl Line {
    /// Company name used for grouping and filtering.
    pub fn company_name(&self) -> &str {
        if self.company.is_empty() {
            OTHER_COMPANY
        } else {
            &self.company
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        non_empty(&self.line_symbol)
    }

    pub fn icon_asset_name(&self) -> Option<&str> {
        non_empty(&self.icon_asset_name)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
