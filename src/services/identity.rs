// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity session: who is signed in, and a change feed for it.

use crate::error::{AppError, Result};
use crate::services::id_token::{IdTokenVerifier, TokenError};
use std::sync::Arc;
use tokio::sync::watch;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInUser {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub provider: Option<String>,
}

impl SignedInUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
            provider: None,
        }
    }
}

/// Current identity plus a `watch` channel that fires on every change.
pub struct IdentitySession {
    verifier: Option<Arc<IdTokenVerifier>>,
    current: watch::Sender<Option<SignedInUser>>,
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySession {
    /// A session that can only be driven through [`IdentitySession::sign_in`].
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            verifier: None,
            current,
        }
    }

    pub fn with_verifier(verifier: Arc<IdTokenVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
            ..Self::new()
        }
    }

    pub fn current_user(&self) -> Option<SignedInUser> {
        self.current.borrow().clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|u| u.user_id.clone())
    }

    /// Receiver that observes every identity change.
    pub fn subscribe(&self) -> watch::Receiver<Option<SignedInUser>> {
        self.current.subscribe()
    }

    /// Verify a provider ID token and make its subject the current user.
    pub async fn sign_in_with_id_token(&self, id_token: &str) -> Result<SignedInUser> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| AppError::Auth("ID token sign-in is not configured".to_string()))?;

        let identity = verifier.verify(id_token).await.map_err(|e| match e {
            TokenError::Invalid(msg) => AppError::Auth(msg),
            TokenError::Transient(msg) => AppError::Network(msg),
        })?;

        let user = SignedInUser {
            user_id: identity.user_id,
            display_name: identity.display_name,
            email: identity.email,
            provider: identity.sign_in_provider,
        };
        self.sign_in(user.clone());
        Ok(user)
    }

    /// Make `user` the current user. Re-signing the same user is not a change.
    pub fn sign_in(&self, user: SignedInUser) {
        let changed = self.current.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            *current = Some(user.clone());
            true
        });

        if changed {
            tracing::info!(user_id = %user.user_id, "User signed in");
        }
    }

    pub fn sign_out(&self) {
        let previous = self.current.send_replace(None);
        if let Some(user) = previous {
            tracing::info!(user_id = %user.user_id, "User signed out");
        }
    }
}
