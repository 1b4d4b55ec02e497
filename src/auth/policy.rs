// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route authorization policy.
//!
//! ## Decision rule
//!
//! 1. No claims: deny.
//! 2. Operation not configured: allow any authenticated caller.
//! 3. Requirement restricts principal types and the caller's is not listed: deny.
//! 4. Explicit scope: a revoked capability denies, a granted one allows.
//! 5. Role bundle implies the capability: allow.
//! 6. Otherwise deny.
//!
//! Explicit scope is consulted before the role, so a scope revocation beats
//! a role-implied grant.
//!
//! ## Reloading
//!
//! A policy is never edited in place. [`PolicyHandle`] hands out `Arc`
//! snapshots; a reload parses a complete new policy and swaps it in, so a
//! request keeps the snapshot it started with.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;

use super::claims::{Claims, PrincipalType};
use super::roles::RoleBundles;
use super::scope::ScopeMatch;
use crate::config::ConfigError;

/// Capability required to invoke one operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Requirement {
    pub capability: String,
    /// Principal types allowed at all; empty means any.
    #[serde(default)]
    pub principal_types: Vec<PrincipalType>,
}

/// Where an allow decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Operation has no requirement; any authenticated caller passes.
    AuthenticatedDefault,
    /// The token's scope names the capability.
    Scope,
    /// The token's role bundle implies the capability.
    Role,
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("authentication required")]
    Unauthenticated,
    #[error("principal type '{0}' is not allowed")]
    PrincipalTypeNotAllowed(PrincipalType),
    #[error("capability '{0}' is revoked by token scope")]
    ScopeRevoked(String),
    #[error("missing capability '{0}'")]
    MissingCapability(String),
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Process-wide mapping from operation identifier to requirement.
///
/// Operation identifiers are `"<METHOD> <route path>"`, e.g. `"GET /test"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationPolicy {
    #[serde(default)]
    roles: RoleBundles,
    #[serde(default)]
    operations: HashMap<String, Requirement>,
}

impl AuthorizationPolicy {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::PolicyUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json(&json).map_err(|e| ConfigError::PolicyMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Builder for policies assembled in code.
    pub fn with_operation(mut self, operation: impl Into<String>, requirement: Requirement) -> Self {
        self.operations.insert(operation.into(), requirement);
        self
    }

    pub fn with_roles(mut self, roles: RoleBundles) -> Self {
        self.roles = roles;
        self
    }

    pub fn requirement(&self, operation: &str) -> Option<&Requirement> {
        self.operations.get(operation)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Decide whether `claims` may invoke `operation`.
    pub fn decide(&self, claims: Option<&Claims>, operation: &str) -> Decision {
        let Some(claims) = claims else {
            return Decision::Deny(Denial::Unauthenticated);
        };

        let Some(requirement) = self.operations.get(operation) else {
            return Decision::Allow(Grant::AuthenticatedDefault);
        };

        if !requirement.principal_types.is_empty()
            && !requirement.principal_types.contains(&claims.principal_type())
        {
            return Decision::Deny(Denial::PrincipalTypeNotAllowed(claims.principal_type()));
        }

        let capability = requirement.capability.as_str();
        match claims.scope().lookup(capability) {
            ScopeMatch::Revoked => Decision::Deny(Denial::ScopeRevoked(capability.to_string())),
            ScopeMatch::Granted => Decision::Allow(Grant::Scope),
            ScopeMatch::Absent if self.roles.implies(claims.role(), capability) => {
                Decision::Allow(Grant::Role)
            }
            ScopeMatch::Absent => Decision::Deny(Denial::MissingCapability(capability.to_string())),
        }
    }
}

/// Shared, swappable reference to the active policy.
#[derive(Debug, Clone)]
pub struct PolicyHandle {
    current: Arc<RwLock<Arc<AuthorizationPolicy>>>,
    source: Option<PathBuf>,
}

impl PolicyHandle {
    pub fn new(policy: AuthorizationPolicy) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(policy))),
            source: None,
        }
    }

    /// Load from `path`, remembering it for later reloads.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let policy = AuthorizationPolicy::from_file(&path)?;
        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(policy))),
            source: Some(path),
        })
    }

    /// The policy in force right now. Later reloads do not affect it.
    pub fn snapshot(&self) -> Arc<AuthorizationPolicy> {
        // Writers only swap an Arc, so a poisoned lock still holds a whole policy.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the active policy.
    pub fn replace(&self, policy: AuthorizationPolicy) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(policy);
    }

    /// Re-read the source file. On failure the active policy stays in force.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        let policy = AuthorizationPolicy::from_file(path)?;
        tracing::info!(
            path = %path.display(),
            operations = policy.operation_count(),
            roles = policy.roles.len(),
            "Authorization policy reloaded"
        );
        self.replace(policy);
        Ok(())
    }
}
