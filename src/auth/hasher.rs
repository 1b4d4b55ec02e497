// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing with Argon2id.
//!
//! ## Encoding
//!
//! Hashes are stored as PHC strings, which embed everything needed to verify
//! them again:
//!
//! ```text
//! $argon2id$v=19$m=65536,t=3,p=4$<salt b64>$<hash b64>
//! ```
//!
//! Verification always rebuilds Argon2 from the stored algorithm, version and
//! parameters, so changing the configured defaults never invalidates
//! credentials already on disk.
//!
//! ## Resource control
//!
//! Each derivation allocates `memory_kib` of RAM. The async entry points take
//! permits from a semaphore before moving the work onto the blocking pool;
//! the permits travel with the blocking task and are released only when the
//! derivation finishes. One permit covers the configured memory cost, so
//! verifying a credential stored with a heavier cost takes proportionally
//! more, up to the whole pool.

use std::sync::Arc;

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Argon2 salt bounds in bytes (the PHC salt field caps at 64 b64 chars).
const MIN_SALT_LEN: usize = 8;
const MAX_SALT_LEN: usize = 48;

/// Memory budget used to size the worker permits when none is configured.
pub const DEFAULT_MEMORY_BUDGET_MIB: u64 = 512;

/// Credential hashing failure. Aborts the credential write that triggered it.
#[derive(Debug, Error)]
pub enum HashingError {
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),
    #[error("stored credential is not a valid argon2 PHC string")]
    InvalidEncoding,
    #[error("key derivation failed: {0}")]
    Derivation(String),
    #[error("hashing worker unavailable")]
    WorkerUnavailable,
}

/// Tunable Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    /// Salt length in bytes
    pub salt_len: usize,
    /// Derived key length in bytes
    pub key_len: usize,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 4,
            salt_len: 16,
            key_len: 32,
        }
    }
}

impl HashParams {
    fn argon2_params(&self) -> Result<Params, HashingError> {
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&self.salt_len) {
            return Err(HashingError::InvalidParams(format!(
                "salt length must be {MIN_SALT_LEN}..={MAX_SALT_LEN} bytes, got {}",
                self.salt_len
            )));
        }
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.key_len),
        )
        .map_err(|e| HashingError::InvalidParams(e.to_string()))
    }
}

/// Parsed view of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub algorithm_tag: String,
    pub version: Option<u32>,
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_length: usize,
    pub key_length: usize,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    encoded: String,
}

impl StoredCredential {
    pub fn parse(encoded: &str) -> Result<Self, HashingError> {
        let parsed = PasswordHash::new(encoded).map_err(|_| HashingError::InvalidEncoding)?;
        Algorithm::try_from(parsed.algorithm).map_err(|_| HashingError::InvalidEncoding)?;

        let params = Params::try_from(&parsed).map_err(|_| HashingError::InvalidEncoding)?;
        let salt = parsed.salt.ok_or(HashingError::InvalidEncoding)?;
        let hash = parsed.hash.ok_or(HashingError::InvalidEncoding)?;

        let mut salt_buf = [0u8; 64];
        let salt = salt
            .decode_b64(&mut salt_buf)
            .map_err(|_| HashingError::InvalidEncoding)?
            .to_vec();

        Ok(Self {
            algorithm_tag: parsed.algorithm.as_str().to_string(),
            version: parsed.version,
            memory_cost: params.m_cost(),
            iterations: params.t_cost(),
            parallelism: params.p_cost(),
            salt_length: salt.len(),
            key_length: hash.len(),
            salt,
            hash: hash.as_bytes().to_vec(),
            encoded: encoded.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    fn matches(&self, params: &HashParams) -> bool {
        self.algorithm_tag == Algorithm::Argon2id.as_str()
            && self.version == Some(Version::V0x13.into())
            && self.memory_cost == params.memory_kib
            && self.iterations == params.iterations
            && self.parallelism == params.parallelism
            && self.salt_length == params.salt_len
            && self.key_length == params.key_len
    }
}

impl std::fmt::Display for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Hashes and verifies passwords, bounding concurrent derivations.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: HashParams,
    argon2_params: Params,
    permits: Arc<Semaphore>,
    total_permits: u32,
}

impl CredentialHasher {
    /// Create a hasher allowing at most `max_concurrent` derivations at once.
    pub fn new(params: HashParams, max_concurrent: usize) -> Result<Self, HashingError> {
        let argon2_params = params.argon2_params()?;
        let total_permits = u32::try_from(max_concurrent.max(1)).unwrap_or(u32::MAX);
        Ok(Self {
            params,
            argon2_params,
            permits: Arc::new(Semaphore::new(total_permits as usize)),
            total_permits,
        })
    }

    /// Size the worker permits from the CPU count and a memory budget.
    pub fn with_memory_budget(params: HashParams, budget_mib: u64) -> Result<Self, HashingError> {
        let permits = default_permits(&params, budget_mib);
        Self::new(params, permits)
    }

    pub fn params(&self) -> &HashParams {
        &self.params
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Hash on the blocking pool once a worker permit is available.
    pub async fn hash(&self, password: &str) -> Result<String, HashingError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| HashingError::WorkerUnavailable)?;
        let hasher = self.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hasher.hash_blocking(&password)
        })
        .await
        .map_err(|_| HashingError::WorkerUnavailable)?
    }

    /// Verify on the blocking pool once enough worker permits for the stored
    /// memory cost are available.
    pub async fn verify(&self, password: &str, encoded: &str) -> Result<bool, HashingError> {
        let stored = StoredCredential::parse(encoded)?;
        let permit = Arc::clone(&self.permits)
            .acquire_many_owned(self.permits_for(stored.memory_cost))
            .await
            .map_err(|_| HashingError::WorkerUnavailable)?;
        let hasher = self.clone();
        let password = password.to_owned();
        let encoded = encoded.to_owned();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hasher.verify_blocking(&password, &encoded)
        })
        .await
        .map_err(|_| HashingError::WorkerUnavailable)?
    }

    /// Permits needed to derive with `memory_cost` KiB: one per configured
    /// memory cost, capped at the pool size so any stored cost can proceed.
    fn permits_for(&self, memory_cost: u32) -> u32 {
        memory_cost
            .div_ceil(self.params.memory_kib.max(1))
            .clamp(1, self.total_permits)
    }

    /// Hash `password` with a fresh salt. Runs on the calling thread.
    pub fn hash_blocking(&self, password: &str) -> Result<String, HashingError> {
        self.hash_with_rng(password, &mut OsRng)
    }

    fn hash_with_rng(&self, password: &str, rng: &mut impl RngCore) -> Result<String, HashingError> {
        let mut salt = vec![0u8; self.params.salt_len];
        rng.try_fill_bytes(&mut salt)
            .map_err(|e| HashingError::Entropy(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| HashingError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            self.argon2_params.clone(),
        );
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| HashingError::Derivation(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify `password` against a stored PHC string. Runs on the calling thread.
    ///
    /// Returns `Ok(false)` for a wrong password and `Err` only when the stored
    /// value cannot be interpreted.
    pub fn verify_blocking(&self, password: &str, encoded: &str) -> Result<bool, HashingError> {
        let parsed = PasswordHash::new(encoded).map_err(|_| HashingError::InvalidEncoding)?;
        let algorithm =
            Algorithm::try_from(parsed.algorithm).map_err(|_| HashingError::InvalidEncoding)?;
        let version = parsed
            .version
            .map(Version::try_from)
            .transpose()
            .map_err(|_| HashingError::InvalidEncoding)?
            .unwrap_or_default();
        let params = Params::try_from(&parsed).map_err(|_| HashingError::InvalidEncoding)?;

        // Output comparison inside verify_password is constant time.
        match Argon2::new(algorithm, version, params).verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashingError::Derivation(e.to_string())),
        }
    }

    /// Whether a stored credential was produced with other than the current
    /// parameters and should be re-hashed on the next successful login.
    pub fn needs_rehash(&self, encoded: &str) -> Result<bool, HashingError> {
        Ok(!StoredCredential::parse(encoded)?.matches(&self.params))
    }
}

fn default_permits(params: &HashParams, budget_mib: u64) -> usize {
    let per_call_kib = u64::from(params.memory_kib.max(1));
    let by_memory = (budget_mib.saturating_mul(1024) / per_call_kib).max(1);
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(usize::try_from(by_memory).unwrap_or(usize::MAX)).max(1)
}
