// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token verification, route authorization and password hashing.
//!
//! ## Auth Flow
//!
//! 1. The gateway issues a JWT signed with its private key
//! 2. Clients send `Authorization: Bearer <JWT>`
//! 3. This service:
//!    - Verifies the signature against the pinned gateway public key
//!    - Checks `exp`/`nbf` (60 second leeway by default)
//!    - Decodes `id`, `type`, `role`, `scope` and the `object` principal
//!    - Applies the route policy: explicit scope, then role bundle
//!
//! ## Security
//!
//! - Only asymmetric algorithms matching the pinned key are accepted
//! - Protected routes deny anonymous callers
//! - Tokens, passwords and password hashes are never logged
//! - Disabling enforcement (`AUTH_ENABLED=false`) is logged at WARN on
//!   startup and marked on every response with `x-auth-enforcement: disabled`

pub mod claims;
pub mod error;
pub mod extractor;
pub mod hasher;
pub mod keys;
pub mod pipeline;
pub mod policy;
pub mod roles;
pub mod scope;
pub mod verifier;

pub use claims::{Claims, Principal, PrincipalType};
pub use error::{AuthError, AuthorizationError, TokenError};
pub use extractor::{Auth, OptionalAuth};
pub use hasher::{CredentialHasher, HashParams, HashingError, StoredCredential};
pub use keys::{KeyFamily, TrustedKey};
pub use pipeline::{enforce, Authenticate, Authorize, Enforcement, Pipeline, ENFORCEMENT_HEADER};
pub use policy::{AuthorizationPolicy, Decision, Denial, Grant, PolicyHandle, Requirement};
pub use roles::RoleBundles;
pub use scope::Scope;
pub use verifier::{TokenVerifier, VerifierOptions};
