// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::hasher::CredentialHasher;
use crate::auth::keys::TrustedKey;
use crate::auth::pipeline::{Authenticate, Authorize, Enforcement, Pipeline};
use crate::auth::policy::{AuthorizationPolicy, PolicyHandle};
use crate::auth::verifier::TokenVerifier;
use crate::config::{Config, ConfigError};
use crate::store::InMemoryUserStore;

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub policy: PolicyHandle,
    pub users: Arc<InMemoryUserStore>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, policy: PolicyHandle, users: InMemoryUserStore) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            policy,
            users: Arc::new(users),
        }
    }

    /// Load keys and policy and assemble the auth pipeline.
    ///
    /// The public key is loaded even when enforcement is disabled, so a
    /// deployment cannot start with a broken key just because auth is off.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let key = TrustedKey::from_pem_file(&config.public_key_path)?;
        tracing::info!(
            path = %config.public_key_path.display(),
            family = ?key.family(),
            "Loaded gateway public key"
        );
        let verifier = Arc::new(TokenVerifier::new(key, config.verifier.clone()));

        let policy = match &config.policy_path {
            Some(path) => PolicyHandle::from_file(path)?,
            None => {
                tracing::warn!("No authorization policy configured; every authenticated caller is allowed");
                PolicyHandle::new(AuthorizationPolicy::default())
            }
        };

        let hasher = match config.hash_max_concurrent {
            Some(permits) => CredentialHasher::new(config.hash_params, permits),
            None => CredentialHasher::with_memory_budget(
                config.hash_params,
                config.hash_memory_budget_mib,
            ),
        }
        .map_err(|e| ConfigError::HashParams(e.to_string()))?;
        tracing::info!(
            memory_kib = config.hash_params.memory_kib,
            iterations = config.hash_params.iterations,
            parallelism = config.hash_params.parallelism,
            workers = hasher.available_permits(),
            "Credential hasher ready"
        );

        if config.enforcement == Enforcement::Disabled {
            tracing::warn!(
                "AUTH ENFORCEMENT DISABLED: protected routes accept unauthenticated requests. \
                 Never run this configuration in production."
            );
        }

        let pipeline = Pipeline::new(config.enforcement)
            .with_stage(Authenticate::new(verifier))
            .with_stage(Authorize::new(policy.clone()));

        Ok(Self::new(pipeline, policy, InMemoryUserStore::new(hasher)))
    }
}
