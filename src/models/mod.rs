// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod line;
pub mod station;
pub mod user;
pub mod visit;

pub use line::Line;
pub use station::Station;
pub use user::User;
pub use visit::StationVisit;
