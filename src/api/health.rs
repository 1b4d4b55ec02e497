// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

/// Liveness probe handler.
///
/// Public; always returns 200 while the process is serving.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = String, content_type = "text/plain")
    )
)]
pub async fn healthz() -> &'static str {
    "OK"
}
