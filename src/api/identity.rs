// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handlers behind the auth pipeline.

use axum::{extract::State, Json};
use uuid::Uuid;

use crate::auth::claims::{Claims, PrincipalType};
use crate::auth::extractor::OptionalAuth;
use crate::models::{AccountView, CallerView, WhoAmIResponse};
use crate::state::AppState;

/// Protected smoke-test endpoint.
#[utoipa::path(
    get,
    path = "/test",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller passed the auth pipeline", body = String, content_type = "text/plain"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Token lacks the required capability")
    )
)]
pub async fn test() -> &'static str {
    "This is a test!"
}

/// Describe the caller identified by the bearer token.
#[utoipa::path(
    get,
    path = "/v1/whoami",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller identity", body = WhoAmIResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Token lacks the required capability")
    )
)]
pub async fn whoami(
    State(state): State<AppState>,
    OptionalAuth(claims): OptionalAuth,
) -> Json<WhoAmIResponse> {
    let Some(claims) = claims else {
        return Json(WhoAmIResponse {
            authenticated: false,
            caller: None,
        });
    };

    let account = stored_account(&state, &claims).await;
    Json(WhoAmIResponse {
        authenticated: true,
        caller: Some(CallerView::from_claims(&claims, account)),
    })
}

async fn stored_account(state: &AppState, claims: &Claims) -> Option<AccountView> {
    if claims.principal_type() != PrincipalType::User {
        return None;
    }
    let id = Uuid::parse_str(claims.subject_id()).ok()?;
    state.users.get(id).await.as_ref().map(AccountView::from)
}
