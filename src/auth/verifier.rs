// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! A token moves through `parse → signature → time claims → typed claims`
//! and either comes out as [`Claims`] or is rejected with the [`TokenError`]
//! of the first stage that failed. Verification is synchronous and does no
//! I/O; the trusted key is loaded once and shared.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::{Claims, RawClaims};
use super::error::TokenError;
use super::keys::TrustedKey;

/// Default clock skew tolerance (60 seconds).
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

const BEARER_PREFIX: &str = "Bearer ";

/// Verifier settings beyond the key itself.
#[derive(Debug, Clone, Default)]
pub struct VerifierOptions {
    /// Expected `iss`, checked only when set
    pub issuer: Option<String>,
    /// Expected `aud`, checked only when set
    pub audience: Option<String>,
    /// Clock skew tolerance applied to `exp` and `nbf`
    pub leeway_secs: u64,
}

impl VerifierOptions {
    pub fn new() -> Self {
        Self {
            leeway_secs: DEFAULT_LEEWAY_SECS,
            ..Default::default()
        }
    }
}

/// Validates tokens against the trusted public key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: TrustedKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(key: TrustedKey, options: VerifierOptions) -> Self {
        let algorithms = key.family().algorithms();

        let mut validation = Validation::new(algorithms[0]);
        validation.algorithms = algorithms.to_vec();
        validation.leeway = options.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);

        if let Some(issuer) = &options.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &options.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self { key, validation }
    }

    /// Verify a bearer credential, with or without the `Bearer ` prefix.
    pub fn verify(&self, bearer: &str) -> Result<Claims, TokenError> {
        let token = strip_scheme(bearer);

        if !is_three_part(token) {
            return Err(TokenError::Malformed);
        }

        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;

        // Refuse downgrades (HS*, none) before any key material is touched.
        if !self.validation.algorithms.contains(&header.alg) {
            return Err(TokenError::SignatureInvalid);
        }

        let data = decode::<serde_json::Value>(token, self.key.decoding_key(), &self.validation)
            .map_err(|e| classify(e.kind()))?;

        let raw: RawClaims =
            serde_json::from_value(data.claims).map_err(|_| TokenError::ClaimTypeMismatch)?;

        Claims::from_raw(raw)
    }
}

/// The auth scheme name is case-insensitive (RFC 7235).
fn strip_scheme(bearer: &str) -> &str {
    let bearer = bearer.trim();
    match bearer.get(..BEARER_PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => {
            bearer[BEARER_PREFIX.len()..].trim()
        }
        _ => bearer,
    }
}

fn is_three_part(token: &str) -> bool {
    let mut parts = token.split('.');
    let well_formed = (&mut parts).take(3).filter(|p| !p.is_empty()).count() == 3;
    well_formed && parts.next().is_none()
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject => TokenError::ClaimTypeMismatch,
        _ => TokenError::Malformed,
    }
}
