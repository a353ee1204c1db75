// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reacts to identity changes: user setup, migration and sync lifecycle.
//!
//! On sign-in the user document is created if missing, local visits are
//! migrated when the user has no cloud visits yet, and a full load starts.
//! On sign-out the visit subscription is torn down.

use crate::error::{AppError, Result};
use crate::observe::Subscription;
use crate::services::identity::{IdentitySession, SignedInUser};
use crate::services::migration::{MigrationReport, MigrationService};
use crate::services::sync::SyncService;
use std::sync::Arc;

/// What happened to local data during sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The user already had cloud visits; migration was not attempted.
    ExistingCloudData,
    Migrated(MigrationReport),
}

pub struct SessionCoordinator {
    identity: Arc<IdentitySession>,
    sync: Arc<SyncService>,
    migration: Arc<MigrationService>,
}

impl SessionCoordinator {
    pub fn new(
        identity: Arc<IdentitySession>,
        sync: Arc<SyncService>,
        migration: Arc<MigrationService>,
    ) -> Self {
        Self {
            identity,
            sync,
            migration,
        }
    }

    pub fn identity(&self) -> &Arc<IdentitySession> {
        &self.identity
    }

    /// Run the sign-in flow for `user`.
    pub async fn handle_signed_in(&self, user: &SignedInUser) -> Result<SignInOutcome> {
        if let Err(e) = self.sync.create_user_if_needed(user).await {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to initialize user account");
            return Err(AppError::Auth(format!(
                "Failed to initialize user account: {}",
                e
            )));
        }

        let outcome = if self.sync.has_any_visits(&user.user_id).await {
            tracing::debug!(user_id = %user.user_id, "Cloud visits exist, skipping migration");
            SignInOutcome::ExistingCloudData
        } else {
            let report = self.migration.migrate_local_visits(&user.user_id).await?;
            SignInOutcome::Migrated(report)
        };

        self.sync.load_all().await;
        Ok(outcome)
    }

    pub fn handle_signed_out(&self) {
        self.sync.stop();
    }

    /// Verify `id_token`, sign in and run the sign-in flow.
    pub async fn sign_in_with_id_token(&self, id_token: &str) -> Result<(SignedInUser, SignInOutcome)> {
        let user = self.identity.sign_in_with_id_token(id_token).await?;
        let outcome = self.handle_signed_in(&user).await?;
        Ok((user, outcome))
    }

    /// Sign the current user out; stamping the profile is best-effort.
    pub async fn sign_out(&self) {
        if self.identity.current_user_id().is_some() {
            if let Err(e) = self.sync.record_sign_out().await {
                tracing::warn!(error = %e, "Failed to record sign-out");
            }
        }
        self.identity.sign_out();
        self.handle_signed_out();
    }

    /// Follow identity changes in the background.
    ///
    /// Every change to a signed-in user runs the sign-in flow; a change to
    /// nobody runs the sign-out flow.
    pub fn start(self: &Arc<Self>) -> Subscription {
        let coordinator = self.clone();
        let mut changes = self.identity.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let current = changes.borrow_and_update().clone();
                match current {
                    Some(user) => {
                        if let Err(e) = coordinator.handle_signed_in(&user).await {
                            tracing::warn!(user_id = %user.user_id, error = %e, "Sign-in flow failed");
                        }
                    }
                    None => coordinator.handle_signed_out(),
                }

                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        Subscription::from_task(handle)
    }
}
