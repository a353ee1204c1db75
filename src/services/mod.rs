// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod id_token;
pub mod identity;
pub mod migration;
pub mod session;
pub mod sync;
pub mod view;

pub use id_token::{IdTokenVerifier, TokenError, VerifiedIdentity};
pub use identity::{IdentitySession, SignedInUser};
pub use migration::{MigrationOutcome, MigrationPhase, MigrationReport, MigrationService};
pub use session::{SessionCoordinator, SignInOutcome};
pub use sync::{SyncEvent, SyncService, SyncSettings, SyncState};
pub use view::{ProgressInfo, StationEntry, ViewState, ViewStore};
