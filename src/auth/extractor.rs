// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for verified claims.
//!
//! The [`enforce`](super::pipeline::enforce) middleware verifies the token and
//! stores the resulting [`Claims`] in the request extensions. Handlers read
//! them back here:
//!
//! ```rust,ignore
//! async fn whoami(Auth(claims): Auth) -> impl IntoResponse {
//!     claims.subject_id().to_string()
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::claims::Claims;
use super::error::AuthError;

/// Claims attached by the auth pipeline.
///
/// Rejects with 401 when nothing was attached, which happens on routes
/// outside the pipeline or while enforcement is disabled.
pub struct Auth(pub Claims);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Claims if the pipeline attached any.
pub struct OptionalAuth(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<Claims>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts_with(claims: Option<Claims>) -> Parts {
        let mut request = Request::builder().uri("/v1/whoami").body(()).unwrap();
        if let Some(claims) = claims {
            request.extensions_mut().insert(claims);
        }
        request.into_parts().0
    }

    #[tokio::test]
    async fn auth_reads_claims_from_extensions() {
        let mut parts = parts_with(Some(Claims::test_user("operator", "test:read")));
        let Auth(claims) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(claims.subject_id(), "user_123");
    }

    #[tokio::test]
    async fn auth_rejects_without_claims() {
        let mut parts = parts_with(None);
        let err = Auth::from_request_parts(&mut parts, &()).await.err().unwrap();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_claims() {
        let mut parts = parts_with(None);
        let OptionalAuth(claims) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(claims.is_none());
    }

    #[tokio::test]
    async fn optional_auth_returns_claims_when_present() {
        let mut parts = parts_with(Some(Claims::test_service("lb", "")));
        let OptionalAuth(claims) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(claims.unwrap().subject_id(), "svc_billing");
    }
}
