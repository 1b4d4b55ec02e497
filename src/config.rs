// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once at startup, validated, and handed to the
//! components that need it. Nothing reads the environment after that.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_ENABLED` | `false`/`0`/`off`/`no`/`disabled` turn enforcement off | enabled |
//! | `SECNEX_GATEWAY_PUBLIC_KEY` | Path to the gateway's PEM public key | Required |
//! | `AUTH_POLICY_PATH` | JSON route policy file | empty policy |
//! | `AUTH_ISSUER` | Expected `iss` claim | not checked |
//! | `AUTH_AUDIENCE` | Expected `aud` claim | not checked |
//! | `AUTH_LEEWAY_SECONDS` | Clock skew tolerance for `exp`/`nbf` | `60` |
//! | `HASH_MEMORY_KIB` | Argon2id memory cost | `65536` |
//! | `HASH_ITERATIONS` | Argon2id time cost | `3` |
//! | `HASH_PARALLELISM` | Argon2id lanes | `4` |
//! | `HASH_SALT_LENGTH` | Salt bytes | `16` |
//! | `HASH_KEY_LENGTH` | Derived key bytes | `32` |
//! | `HASH_MAX_CONCURRENT` | Concurrent derivations | from CPUs and memory budget |
//! | `HASH_MEMORY_BUDGET_MIB` | RAM reserved for hashing | `512` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS with these PEM files | plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::hasher::{HashParams, DEFAULT_MEMORY_BUDGET_MIB};
use crate::auth::pipeline::Enforcement;
use crate::auth::verifier::{VerifierOptions, DEFAULT_LEEWAY_SECS};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_ENABLED_ENV: &str = "AUTH_ENABLED";
/// Path to the PEM public key of the gateway that signs tokens.
pub const PUBLIC_KEY_ENV: &str = "SECNEX_GATEWAY_PUBLIC_KEY";
pub const POLICY_PATH_ENV: &str = "AUTH_POLICY_PATH";
pub const ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const LEEWAY_ENV: &str = "AUTH_LEEWAY_SECONDS";
pub const HASH_MEMORY_ENV: &str = "HASH_MEMORY_KIB";
pub const HASH_ITERATIONS_ENV: &str = "HASH_ITERATIONS";
pub const HASH_PARALLELISM_ENV: &str = "HASH_PARALLELISM";
pub const HASH_SALT_LENGTH_ENV: &str = "HASH_SALT_LENGTH";
pub const HASH_KEY_LENGTH_ENV: &str = "HASH_KEY_LENGTH";
pub const HASH_MAX_CONCURRENT_ENV: &str = "HASH_MAX_CONCURRENT";
pub const HASH_MEMORY_BUDGET_ENV: &str = "HASH_MEMORY_BUDGET_MIB";
pub const TLS_CERT_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_ENV: &str = "TLS_KEY_PATH";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Startup configuration failure. Every variant is fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("cannot read public key {path}: {source}")]
    KeyUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed public key {path}: {reason}")]
    KeyMalformed { path: PathBuf, reason: String },
    #[error("cannot read authorization policy {path}: {source}")]
    PolicyUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed authorization policy {path}: {reason}")]
    PolicyMalformed { path: PathBuf, reason: String },
    #[error("invalid hashing parameters: {0}")]
    HashParams(String),
}

impl ConfigError {
    /// Configuration problems are server faults, never the caller's.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub enforcement: Enforcement,
    pub public_key_path: PathBuf,
    pub policy_path: Option<PathBuf>,
    pub verifier: VerifierOptions,
    pub hash_params: HashParams,
    /// Explicit worker cap; derived from the memory budget when unset.
    pub hash_max_concurrent: Option<usize>,
    pub hash_memory_budget_mib: u64,
    pub tls: Option<TlsPaths>,
}

impl Config {
    /// Read the process environment. `main` loads `.env` before this runs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let addr = SocketAddr::from_str(&format!("{host}:{port}"))
            .map_err(|_| ConfigError::Invalid(HOST_ENV))?;

        let enforcement = Enforcement::parse(lookup(AUTH_ENABLED_ENV).as_deref());

        let public_key_path = get(PUBLIC_KEY_ENV)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(PUBLIC_KEY_ENV))?;

        let policy_path = get(POLICY_PATH_ENV).map(PathBuf::from);

        let verifier = VerifierOptions {
            issuer: get(ISSUER_ENV),
            audience: get(AUDIENCE_ENV),
            leeway_secs: parse_or(get(LEEWAY_ENV), LEEWAY_ENV, DEFAULT_LEEWAY_SECS)?,
        };

        let defaults = HashParams::default();
        let hash_params = HashParams {
            memory_kib: parse_or(get(HASH_MEMORY_ENV), HASH_MEMORY_ENV, defaults.memory_kib)?,
            iterations: parse_or(get(HASH_ITERATIONS_ENV), HASH_ITERATIONS_ENV, defaults.iterations)?,
            parallelism: parse_or(
                get(HASH_PARALLELISM_ENV),
                HASH_PARALLELISM_ENV,
                defaults.parallelism,
            )?,
            salt_len: parse_or(get(HASH_SALT_LENGTH_ENV), HASH_SALT_LENGTH_ENV, defaults.salt_len)?,
            key_len: parse_or(get(HASH_KEY_LENGTH_ENV), HASH_KEY_LENGTH_ENV, defaults.key_len)?,
        };

        let hash_max_concurrent = match get(HASH_MAX_CONCURRENT_ENV) {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(ConfigError::Invalid(HASH_MAX_CONCURRENT_ENV)),
            },
            None => None,
        };

        let hash_memory_budget_mib = parse_or(
            get(HASH_MEMORY_BUDGET_ENV),
            HASH_MEMORY_BUDGET_ENV,
            DEFAULT_MEMORY_BUDGET_MIB,
        )?;

        let tls = match (get(TLS_CERT_ENV), get(TLS_KEY_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_ENV)),
        };

        Ok(Self {
            addr,
            enforcement,
            public_key_path,
            policy_path,
            verifier,
            hash_params,
            hash_max_concurrent,
            hash_memory_budget_mib,
            tls,
        })
    }
}

/// Parse an optional value, rejecting garbage instead of silently defaulting.
fn parse_or<T: FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = load(&[(PUBLIC_KEY_ENV, "/etc/gateway.pem")]).unwrap();

        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.enforcement, Enforcement::Enabled);
        assert_eq!(config.public_key_path, PathBuf::from("/etc/gateway.pem"));
        assert!(config.policy_path.is_none());
        assert_eq!(config.verifier.leeway_secs, 60);
        assert!(config.verifier.issuer.is_none());
        assert_eq!(config.hash_params, HashParams::default());
        assert!(config.hash_max_concurrent.is_none());
        assert_eq!(config.hash_memory_budget_mib, 512);
        assert!(config.tls.is_none());
    }

    #[test]
    fn missing_public_key_is_fatal() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PUBLIC_KEY_ENV)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = load(&[(PUBLIC_KEY_ENV, "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PUBLIC_KEY_ENV)));
    }

    #[test]
    fn enforcement_only_disabled_by_recognized_value() {
        let off = load(&[(PUBLIC_KEY_ENV, "k.pem"), (AUTH_ENABLED_ENV, "false")]).unwrap();
        assert_eq!(off.enforcement, Enforcement::Disabled);

        let typo = load(&[(PUBLIC_KEY_ENV, "k.pem"), (AUTH_ENABLED_ENV, "flase")]).unwrap();
        assert_eq!(typo.enforcement, Enforcement::Enabled);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = load(&[(PUBLIC_KEY_ENV, "k.pem"), (PORT_ENV, "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(PORT_ENV)));

        let err = load(&[(PUBLIC_KEY_ENV, "k.pem"), (HASH_MEMORY_ENV, "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(HASH_MEMORY_ENV)));

        let err = load(&[(PUBLIC_KEY_ENV, "k.pem"), (HASH_MAX_CONCURRENT_ENV, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(HASH_MAX_CONCURRENT_ENV)));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            (PUBLIC_KEY_ENV, "k.pem"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (POLICY_PATH_ENV, "policy.json"),
            (ISSUER_ENV, "secnex-gateway"),
            (LEEWAY_ENV, "5"),
            (HASH_MEMORY_ENV, "19456"),
            (HASH_MAX_CONCURRENT_ENV, "2"),
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.policy_path, Some(PathBuf::from("policy.json")));
        assert_eq!(config.verifier.issuer.as_deref(), Some("secnex-gateway"));
        assert_eq!(config.verifier.leeway_secs, 5);
        assert_eq!(config.hash_params.memory_kib, 19456);
        assert_eq!(config.hash_max_concurrent, Some(2));
    }

    #[test]
    fn tls_requires_both_paths() {
        let config = load(&[
            (PUBLIC_KEY_ENV, "k.pem"),
            (TLS_CERT_ENV, "cert.pem"),
            (TLS_KEY_ENV, "key.pem"),
        ])
        .unwrap();
        assert_eq!(
            config.tls,
            Some(TlsPaths {
                cert: "cert.pem".into(),
                key: "key.pem".into()
            })
        );

        let err = load(&[(PUBLIC_KEY_ENV, "k.pem"), (TLS_CERT_ENV, "cert.pem")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(TLS_KEY_ENV)));
    }
}
