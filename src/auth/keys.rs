// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trusted public key for token signature verification.
//!
//! ## Security
//!
//! - Only asymmetric keys are accepted; there is no way to configure an
//!   HMAC secret, so a token can never supply its own verification key
//! - The key's family pins the set of acceptable `alg` header values
//! - The key is read once at startup and never refreshed

use std::path::Path;

use jsonwebtoken::{Algorithm, DecodingKey};

use crate::config::ConfigError;

/// DER encoding of the P-256 curve OID (1.2.840.10045.3.1.7).
const OID_P256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
/// DER encoding of the P-384 curve OID (1.3.132.0.34).
const OID_P384: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x22];

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Asymmetric key family of the trusted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EcP256,
    EcP384,
    Ed25519,
}

impl KeyFamily {
    /// Header algorithms a token may name when signed by this key family.
    pub fn algorithms(&self) -> &'static [Algorithm] {
        match self {
            KeyFamily::Rsa => RSA_ALGORITHMS,
            KeyFamily::EcP256 => &[Algorithm::ES256],
            KeyFamily::EcP384 => &[Algorithm::ES384],
            KeyFamily::Ed25519 => &[Algorithm::EdDSA],
        }
    }
}

/// The gateway's public key, parsed and classified.
#[derive(Clone)]
pub struct TrustedKey {
    key: DecodingKey,
    family: KeyFamily,
}

impl std::fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustedKey")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl TrustedKey {
    /// Read and parse a PEM public key from disk.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::KeyUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_pem(&bytes).map_err(|reason| ConfigError::KeyMalformed {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a PEM public key. Private keys and certificates are refused.
    pub fn from_pem(bytes: &[u8]) -> Result<Self, String> {
        let block = pem::parse(bytes).map_err(|e| format!("invalid PEM: {e}"))?;

        match block.tag() {
            "RSA PUBLIC KEY" => {
                let key = DecodingKey::from_rsa_pem(bytes).map_err(|e| e.to_string())?;
                Ok(Self {
                    key,
                    family: KeyFamily::Rsa,
                })
            }
            "PUBLIC KEY" => Self::from_spki(bytes, block.contents()),
            other => Err(format!(
                "expected a PUBLIC KEY block, found {other:?}"
            )),
        }
    }

    fn from_spki(bytes: &[u8], der: &[u8]) -> Result<Self, String> {
        if let Ok(key) = DecodingKey::from_rsa_pem(bytes) {
            return Ok(Self {
                key,
                family: KeyFamily::Rsa,
            });
        }

        if let Ok(key) = DecodingKey::from_ec_pem(bytes) {
            let family = if contains(der, OID_P256) {
                KeyFamily::EcP256
            } else if contains(der, OID_P384) {
                KeyFamily::EcP384
            } else {
                return Err("unsupported elliptic curve".to_string());
            };
            return Ok(Self { key, family });
        }

        if let Ok(key) = DecodingKey::from_ed_pem(bytes) {
            return Ok(Self {
                key,
                family: KeyFamily::Ed25519,
            });
        }

        Err("unsupported public key type".to_string())
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
