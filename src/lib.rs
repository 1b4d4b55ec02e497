// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SecNex Auth - bearer token verification and credential hashing
//!
//! This crate verifies gateway-issued JWTs against a pinned public key,
//! applies a route authorization policy, and hashes user passwords with
//! Argon2id.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - Token verification, authorization policy, auth pipeline, password hashing
//! - `config` - Startup configuration from the environment
//! - `store` - In-memory user persistence
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod telemetry;
