// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authentication pipeline.
//!
//! The bootstrap composes an ordered list of [`Stage`]s; each one looks at the
//! request headers and the shared [`RequestContext`] and either lets the
//! request continue or rejects it. [`enforce`] runs the pipeline as Axum
//! middleware and attaches the verified [`Claims`] to the request extensions,
//! where the [`Auth`](super::Auth) extractor picks them up.
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new(Enforcement::Enabled)
//!     .with_stage(Authenticate::new(verifier))
//!     .with_stage(Authorize::new(policy));
//!
//! let protected = Router::new()
//!     .route("/test", get(test))
//!     .route_layer(axum::middleware::from_fn_with_state(Arc::new(pipeline), enforce));
//! ```

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::claims::Claims;
use super::error::{AuthError, AuthorizationError};
use super::policy::{Decision, PolicyHandle};
use super::verifier::TokenVerifier;

/// Response header set on every request served while enforcement is off.
pub const ENFORCEMENT_HEADER: &str = "x-auth-enforcement";

/// Values of `AUTH_ENABLED` that switch enforcement off.
const OFF_VALUES: &[&str] = &["false", "0", "off", "no", "disabled"];

/// Whether the pipeline runs at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enforcement {
    Enabled,
    /// Local development only: every request is forwarded unauthenticated.
    Disabled,
}

impl Enforcement {
    /// Only a recognized "off" value disables enforcement; anything else,
    /// including an unset variable, leaves it on.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if OFF_VALUES.contains(&v.as_str()) => Enforcement::Disabled,
            _ => Enforcement::Enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Enforcement::Enabled)
    }
}

/// Per-request state shared between stages.
#[derive(Debug, Clone)]
pub struct RequestContext {
    operation: String,
    claims: Option<Claims>,
}

impl RequestContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            claims: None,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    pub fn into_claims(self) -> Option<Claims> {
        self.claims
    }
}

/// What a stage decided.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Reject(AuthError),
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, headers: &HeaderMap, ctx: &mut RequestContext) -> Flow;
}

/// Extracts the bearer token and verifies it.
pub struct Authenticate {
    verifier: Arc<TokenVerifier>,
}

impl Authenticate {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn run(&self, headers: &HeaderMap, ctx: &mut RequestContext) -> Flow {
        let Some(header) = headers.get(AUTHORIZATION) else {
            return Flow::Reject(AuthError::MissingAuthHeader);
        };
        let token = match header.to_str() {
            Ok(value) if !value.trim().is_empty() => value,
            _ => return Flow::Reject(AuthError::InvalidAuthHeader),
        };

        match self.verifier.verify(token) {
            Ok(claims) => {
                ctx.claims = Some(claims);
                Flow::Continue
            }
            Err(e) => Flow::Reject(e.into()),
        }
    }
}

/// Applies the route policy to the verified claims.
pub struct Authorize {
    policy: PolicyHandle,
}

impl Authorize {
    pub fn new(policy: PolicyHandle) -> Self {
        Self { policy }
    }
}

impl Stage for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn run(&self, _headers: &HeaderMap, ctx: &mut RequestContext) -> Flow {
        let policy = self.policy.snapshot();
        match policy.decide(ctx.claims(), ctx.operation()) {
            Decision::Allow(grant) => {
                tracing::debug!(operation = %ctx.operation(), ?grant, "Access granted");
                Flow::Continue
            }
            Decision::Deny(denial) => Flow::Reject(
                AuthorizationError {
                    operation: ctx.operation().to_string(),
                    denial,
                }
                .into(),
            ),
        }
    }
}

/// Result of running the whole pipeline.
#[derive(Debug)]
pub enum Outcome {
    /// Enforcement is off; nothing was checked.
    Bypassed,
    Admitted(RequestContext),
    Rejected { stage: &'static str, error: AuthError },
}

/// Ordered list of stages plus the enforcement switch.
pub struct Pipeline {
    enforcement: Enforcement,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(enforcement: Enforcement) -> Self {
        Self {
            enforcement,
            stages: Vec::new(),
        }
    }

    /// Append a stage. Stages run in insertion order.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, headers: &HeaderMap, operation: impl Into<String>) -> Outcome {
        if !self.enforcement.is_enabled() {
            return Outcome::Bypassed;
        }

        let mut ctx = RequestContext::new(operation);
        for stage in &self.stages {
            if let Flow::Reject(error) = stage.run(headers, &mut ctx) {
                return Outcome::Rejected {
                    stage: stage.name(),
                    error,
                };
            }
        }
        Outcome::Admitted(ctx)
    }
}

/// Operation identifier: method plus the matched route template.
///
/// Axum serves `HEAD` with the `GET` handler, so it is checked as `GET`.
fn operation_id(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = match *request.method() {
        Method::HEAD => Method::GET,
        ref other => other.clone(),
    };
    format!("{method} {path}")
}

/// Axum middleware running the pipeline for each request.
pub async fn enforce(
    State(pipeline): State<Arc<Pipeline>>,
    mut request: Request,
    next: Next,
) -> Response {
    let operation = operation_id(&request);

    match pipeline.run(request.headers(), operation.clone()) {
        Outcome::Bypassed => {
            tracing::debug!(%operation, "Auth enforcement disabled, forwarding unauthenticated");
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(ENFORCEMENT_HEADER, HeaderValue::from_static("disabled"));
            response
        }
        Outcome::Admitted(ctx) => {
            if let Some(claims) = ctx.into_claims() {
                tracing::debug!(
                    %operation,
                    subject = claims.subject_id(),
                    principal = claims.principal().kind(),
                    "Request authenticated"
                );
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        Outcome::Rejected { stage, error } => {
            tracing::warn!(
                %operation,
                stage,
                error_code = error.error_code(),
                status = error.status_code().as_u16(),
                "Request rejected"
            );
            error.into_response()
        }
    }
}
