// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::time::Duration;

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;

use secnex_auth::{
    api::router,
    auth::policy::PolicyHandle,
    config::{Config, TlsPaths},
    error::ServerError,
    state::AppState,
    telemetry::{self, LogFormat},
};

/// Time in-flight HTTPS requests get to finish after shutdown is requested.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    // Before telemetry so `.env` can set LOG_FORMAT and RUST_LOG.
    dotenvy::dotenv().ok();
    telemetry::init(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ServerError::Config(e)) => {
            tracing::error!(error = %e, status = e.status_code().as_u16(), "Invalid configuration, refusing to start");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;

    let shutdown = CancellationToken::new();
    spawn_policy_reload(state.policy.clone(), shutdown.clone());
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    let app = router(state);
    let result = match &config.tls {
        Some(tls) => serve_https(app, config.addr, tls, shutdown.clone()).await,
        None => serve_http(app, config.addr, shutdown.clone()).await,
    };
    shutdown.cancel();
    result
}

async fn serve_http(
    app: Router,
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(%addr, "Listening over HTTP (docs at /docs)");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ServerError::Serve)
}

async fn serve_https(
    app: Router,
    addr: std::net::SocketAddr,
    tls: &TlsPaths,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    // Ignore the error when a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
        .await
        .map_err(ServerError::Tls)?;

    // Stop accepting on shutdown and let in-flight requests drain.
    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        }
    });

    tracing::info!(%addr, "Listening over HTTPS (docs at /docs)");
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn wait_for_shutdown(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

/// Reload the authorization policy on SIGHUP.
///
/// A single task handles every signal, so reloads never overlap.
#[cfg(unix)]
fn spawn_policy_reload(policy: PolicyHandle, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGHUP, policy reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    if let Err(e) = policy.reload() {
                        tracing::error!(error = %e, "Policy reload failed, keeping the active policy");
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_policy_reload(_policy: PolicyHandle, _shutdown: CancellationToken) {}
