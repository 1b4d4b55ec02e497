// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims and the typed principal they describe.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::TokenError;
use super::scope::Scope;

/// Coarse kind of caller named by the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Service,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "user",
            PrincipalType::Service => "service",
        }
    }
}

impl std::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A human account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrincipal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A backend service calling through the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrincipal {
    pub id: String,
    pub name: String,
}

/// A load balancer forwarding on its own behalf (health probes, drains).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerPrincipal {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A managed server (agents, node daemons).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPrincipal {
    pub id: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// The concrete entity a token represents, decoded from the `object` claim.
///
/// The payload carries a `kind` discriminant. When it is absent the kind is
/// taken from the `type` claim, so `{"type": "user", "object": {"id": ..}}`
/// decodes as [`Principal::User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    User(UserPrincipal),
    Service(ServicePrincipal),
    #[serde(rename = "loadbalancer")]
    LoadBalancer(LoadBalancerPrincipal),
    Server(ServerPrincipal),
}

impl Principal {
    /// Every non-human principal authenticates as a service.
    pub fn principal_type(&self) -> PrincipalType {
        match self {
            Principal::User(_) => PrincipalType::User,
            Principal::Service(_) | Principal::LoadBalancer(_) | Principal::Server(_) => {
                PrincipalType::Service
            }
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Principal::User(p) => &p.id,
            Principal::Service(p) => &p.id,
            Principal::LoadBalancer(p) => &p.id,
            Principal::Server(p) => &p.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Principal::User(_) => "user",
            Principal::Service(_) => "service",
            Principal::LoadBalancer(_) => "loadbalancer",
            Principal::Server(_) => "server",
        }
    }

    fn decode(
        mut object: serde_json::Value,
        principal_type: PrincipalType,
    ) -> Result<Self, TokenError> {
        let map = object
            .as_object_mut()
            .ok_or(TokenError::ClaimTypeMismatch)?;
        map.entry("kind")
            .or_insert_with(|| serde_json::Value::from(principal_type.as_str()));

        let principal: Principal =
            serde_json::from_value(object).map_err(|_| TokenError::ClaimTypeMismatch)?;

        if principal.principal_type() != principal_type {
            return Err(TokenError::ClaimTypeMismatch);
        }
        Ok(principal)
    }
}

/// Payload shape expected after the signature and time claims check out.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    id: String,
    #[serde(rename = "type")]
    principal_type: PrincipalType,
    role: String,
    scope: String,
    object: serde_json::Value,
    exp: i64,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
}

/// Identity and authorization facts of a verified token.
///
/// Only the token verifier constructs this type, and only after the
/// signature and time claims have been checked. It lives as long as the
/// request that carried the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    #[serde(rename = "id")]
    subject_id: String,
    #[serde(rename = "type")]
    principal_type: PrincipalType,
    role: String,
    scope: Scope,
    #[serde(rename = "object")]
    principal: Principal,
    #[serde(rename = "exp")]
    expires_at: i64,
    #[serde(rename = "nbf", skip_serializing_if = "Option::is_none")]
    not_before: Option<i64>,
    #[serde(rename = "iat", skip_serializing_if = "Option::is_none")]
    issued_at: Option<i64>,
}

impl Claims {
    pub(crate) fn from_raw(raw: RawClaims) -> Result<Self, TokenError> {
        if raw.id.trim().is_empty() {
            return Err(TokenError::ClaimTypeMismatch);
        }

        let principal = Principal::decode(raw.object, raw.principal_type)?;

        Ok(Self {
            subject_id: raw.id,
            principal_type: raw.principal_type,
            role: raw.role,
            scope: Scope::parse(&raw.scope),
            principal,
            expires_at: raw.exp,
            not_before: raw.nbf,
            issued_at: raw.iat,
        })
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Expiry as a Unix timestamp.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn not_before(&self) -> Option<i64> {
        self.not_before
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }
}

#[cfg(test)]
impl Claims {
    /// Claims for a user principal, bypassing verification.
    pub(crate) fn test_user(role: &str, scope: &str) -> Self {
        Self {
            subject_id: "user_123".to_string(),
            principal_type: PrincipalType::User,
            role: role.to_string(),
            scope: Scope::parse(scope),
            principal: Principal::User(UserPrincipal {
                id: "user_123".to_string(),
                email: None,
            }),
            expires_at: i64::MAX,
            not_before: None,
            issued_at: None,
        }
    }

    /// Claims for a service principal, bypassing verification.
    pub(crate) fn test_service(role: &str, scope: &str) -> Self {
        Self {
            subject_id: "svc_billing".to_string(),
            principal_type: PrincipalType::Service,
            role: role.to_string(),
            scope: Scope::parse(scope),
            principal: Principal::Service(ServicePrincipal {
                id: "svc_billing".to_string(),
                name: "billing".to_string(),
            }),
            expires_at: i64::MAX,
            not_before: None,
            issued_at: None,
        }
    }
}
