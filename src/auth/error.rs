// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! Per-request failures ([`TokenError`], [`AuthorizationError`]) collapse into
//! [`AuthError`], which is the only type that turns into an HTTP response.
//! Messages never include the presented token.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use super::policy::Denial;

/// Why a bearer token was rejected.
///
/// Retrying with the same token can never change the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a structurally valid JWT (wrong segment count, bad base64, bad JSON).
    #[error("Token is malformed")]
    Malformed,
    /// Signature does not verify against the trusted key, or the header asks
    /// for an algorithm the trusted key does not support.
    #[error("Token signature is invalid")]
    SignatureInvalid,
    /// `exp` is in the past.
    #[error("Token has expired")]
    Expired,
    /// `nbf` is in the future.
    #[error("Token is not yet valid")]
    NotYetValid,
    /// A required claim is missing or has the wrong type.
    #[error("Token claims are missing or mistyped")]
    ClaimTypeMismatch,
}

impl TokenError {
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed_token",
            TokenError::SignatureInvalid => "invalid_signature",
            TokenError::Expired => "token_expired",
            TokenError::NotYetValid => "token_not_yet_valid",
            TokenError::ClaimTypeMismatch => "claim_type_mismatch",
        }
    }
}

/// A policy denial for an authenticated (or anonymous) caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{denial} (operation: {operation})")]
pub struct AuthorizationError {
    pub operation: String,
    pub denial: Denial,
}

/// Rejection produced by the request pipeline.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingAuthHeader,
    /// Header is not valid visible ASCII or carries no token
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// Token verification failed
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Policy denied the operation
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::Token(e) => e.error_code(),
            AuthError::Forbidden(e) if e.denial == Denial::Unauthenticated => "unauthenticated",
            AuthError::Forbidden(_) => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader | AuthError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden(e) if e.denial == Denial::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn token_errors_map_uniformly_to_401() {
        for err in [
            TokenError::Malformed,
            TokenError::SignatureInvalid,
            TokenError::Expired,
            TokenError::NotYetValid,
            TokenError::ClaimTypeMismatch,
        ] {
            let response = AuthError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn malformed_token_reports_reason() {
        let response = AuthError::Token(TokenError::Malformed).into_response();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "malformed_token");
    }

    #[test]
    fn denial_returns_403() {
        let err = AuthError::from(AuthorizationError {
            operation: "GET /test".to_string(),
            denial: Denial::MissingCapability("test:read".to_string()),
        });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), "insufficient_permissions");
    }

    #[test]
    fn unauthenticated_denial_returns_401() {
        let err = AuthError::from(AuthorizationError {
            operation: "GET /test".to_string(),
            denial: Denial::Unauthenticated,
        });
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
