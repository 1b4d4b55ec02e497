// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory user store.
//!
//! Stands in for the database. Credentials go through the
//! [`CredentialHasher`] before anything is written, and logins upgrade
//! hashes made with outdated parameters.
//!
//! Hashing never happens under the write lock. Writes that depend on a hash
//! computed outside it re-check the stored credential before applying.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

use crate::auth::hasher::{CredentialHasher, HashingError};
use crate::models::UserRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Hashing(#[from] HashingError),
}

/// Input for the credential checked when the email is unknown.
const DUMMY_PASSWORD: &str = "secnex-auth-unknown-account";

pub struct InMemoryUserStore {
    hasher: CredentialHasher,
    users: RwLock<HashMap<Uuid, UserRecord>>,
    /// Verified against on an unknown email so that a miss costs as much as
    /// a wrong password.
    dummy_credential: OnceCell<String>,
}

impl InMemoryUserStore {
    pub fn new(hasher: CredentialHasher) -> Self {
        Self {
            hasher,
            users: RwLock::new(HashMap::new()),
            dummy_credential: OnceCell::new(),
        }
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    /// Hash the password and insert a new user.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<UserRecord, StoreError> {
        let email = normalize_email(email);
        if self.find_by_email(&email).await.is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        // Hash outside the lock; derivations take a while.
        let record = UserRecord::new(email, password, &self.hasher).await?;

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == record.email) {
            return Err(StoreError::DuplicateEmail);
        }
        users.insert(record.id, record.clone());
        tracing::info!(user_id = %record.id, "User created");
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Option<UserRecord> {
        self.users.read().await.get(&id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let email = normalize_email(email);
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    /// Check a login. Returns `Ok(None)` for an unknown email or a wrong
    /// password; callers should not tell the two apart.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let Some(record) = self.find_by_email(email).await else {
            let dummy = self.dummy_credential().await?;
            self.hasher.verify(password, dummy).await?;
            return Ok(None);
        };

        if !self.hasher.verify(password, record.password_hash()).await? {
            tracing::debug!(user_id = %record.id, "Credential mismatch");
            return Ok(None);
        }

        if self.hasher.needs_rehash(record.password_hash())? {
            let upgraded = self.hasher.hash(password).await?;
            return Ok(self
                .commit_rehash(record.id, record.password_hash(), upgraded)
                .await);
        }

        Ok(Some(record))
    }

    /// Store `upgraded` only if the credential is still `verified`. A password
    /// changed while the rehash ran wins over the rehash.
    async fn commit_rehash(&self, id: Uuid, verified: &str, upgraded: String) -> Option<UserRecord> {
        let mut users = self.users.write().await;
        let current = users.get_mut(&id)?;
        if current.password_hash() == verified {
            current.replace_hash(upgraded);
            tracing::info!(user_id = %id, "Credential rehashed with current parameters");
        } else {
            tracing::debug!(user_id = %id, "Credential changed during rehash, keeping the newer one");
        }
        Some(current.clone())
    }

    /// Replace the user's password. Only the credential of the current record
    /// is touched.
    pub async fn change_password(&self, id: Uuid, password: &str) -> Result<(), StoreError> {
        if self.get(id).await.is_none() {
            return Err(StoreError::NotFound);
        }
        let hash = self.hasher.hash(password).await?;

        let mut users = self.users.write().await;
        let record = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        record.replace_hash(hash);
        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    async fn dummy_credential(&self) -> Result<&str, HashingError> {
        self.dummy_credential
            .get_or_try_init(|| self.hasher.hash(DUMMY_PASSWORD))
            .await
            .map(String::as_str)
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
