// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Persisted records and the API response shapes built from them. Response
//! types derive `ToSchema` for the OpenAPI document.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::claims::{Claims, PrincipalType};
use crate::auth::hasher::{CredentialHasher, HashingError};

// =============================================================================
// User Records
// =============================================================================

/// A user account as persisted.
///
/// The password is hashed before the record exists, so a record can never
/// hold a plaintext password. `Debug` redacts the hash.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Hash `password` and build a new record. Nothing is created on error.
    pub async fn new(
        email: impl Into<String>,
        password: &str,
        hasher: &CredentialHasher,
    ) -> Result<Self, HashingError> {
        let password_hash = hasher.hash(password).await?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    /// Encoded credential (PHC string) for persistence.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Replace the credential with a fresh hash of `password`.
    pub async fn set_password(
        &mut self,
        password: &str,
        hasher: &CredentialHasher,
    ) -> Result<(), HashingError> {
        let hash = hasher.hash(password).await?;
        self.replace_hash(hash);
        Ok(())
    }

    /// Swap in an already computed credential.
    pub(crate) fn replace_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Public view of a stored account.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for AccountView {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            created_at: record.created_at,
        }
    }
}

// =============================================================================
// Caller Identity
// =============================================================================

/// The authenticated caller as seen by this service.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallerView {
    /// Subject identifier (`id` claim).
    pub id: String,
    /// `user` or `service`.
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,
    /// Concrete principal kind (`user`, `service`, `loadbalancer`, `server`).
    pub kind: String,
    pub role: String,
    /// Granted scope tokens, sorted.
    pub scope: Vec<String>,
    /// Expiry as a Unix timestamp.
    pub expires_at: i64,
    /// Stored account, if the subject is a known user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountView>,
}

impl CallerView {
    pub fn from_claims(claims: &Claims, account: Option<AccountView>) -> Self {
        Self {
            id: claims.subject_id().to_string(),
            principal_type: claims.principal_type(),
            kind: claims.principal().kind().to_string(),
            role: claims.role().to_string(),
            scope: claims.scope().tokens().map(str::to_string).collect(),
            expires_at: claims.expires_at(),
            account,
        }
    }
}

/// Response of `GET /v1/whoami`.
///
/// `caller` is absent only while auth enforcement is disabled.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhoAmIResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hasher::HashParams;

    fn hasher() -> CredentialHasher {
        let params = HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
            ..HashParams::default()
        };
        CredentialHasher::new(params, 1).unwrap()
    }

    #[tokio::test]
    async fn new_record_stores_only_the_hash() {
        let hasher = hasher();
        let record = UserRecord::new("ada@example.com", "hunter22", &hasher)
            .await
            .unwrap();

        assert!(record.password_hash().starts_with("$argon2id$"));
        assert!(!record.password_hash().contains("hunter22"));
        assert!(hasher.verify("hunter22", record.password_hash()).await.unwrap());
    }

    #[tokio::test]
    async fn debug_output_redacts_hash() {
        let record = UserRecord::new("ada@example.com", "hunter22", &hasher())
            .await
            .unwrap();
        let debug = format!("{record:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(record.password_hash()));
    }

    #[tokio::test]
    async fn set_password_replaces_hash() {
        let hasher = hasher();
        let mut record = UserRecord::new("ada@example.com", "old-password", &hasher)
            .await
            .unwrap();
        let before = record.password_hash().to_string();

        record.set_password("new-password", &hasher).await.unwrap();

        assert_ne!(record.password_hash(), before);
        assert!(!hasher.verify("old-password", record.password_hash()).await.unwrap());
        assert!(hasher.verify("new-password", record.password_hash()).await.unwrap());
    }

    #[test]
    fn whoami_reflects_claims() {
        let claims = Claims::test_service("lb", "lb:drain !test:read");
        let view = CallerView::from_claims(&claims, None);

        assert_eq!(view.id, "svc_billing");
        assert_eq!(view.principal_type, PrincipalType::Service);
        assert_eq!(view.kind, "service");
        assert_eq!(view.role, "lb");
        assert!(view.scope.contains(&"lb:drain".to_string()));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "service");
        assert!(json.get("account").is_none());
    }
}
