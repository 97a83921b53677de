// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use site_auth_core::{
    api::router,
    clock::system_clock,
    config::Config,
    logging::{self, LogFormat},
    oidc::OidcProvider,
    state::AppState,
    storage::{SiteDatabase, DATABASE_FILE},
};

/// Grace period for in-flight TLS connections after shutdown is requested.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = logging::init(LogFormat::from_env()) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.data_dir.join(DATABASE_FILE);
    let sites = Arc::new(SiteDatabase::open(&db_path)?);
    info!(path = %db_path.display(), "site database opened");

    let provider = Arc::new(OidcProvider::new(config.oauth.clone())?);
    let addr: SocketAddr = config.bind_address().parse()?;
    let tls = config.tls.clone();

    let state = AppState::new(config, sites, provider, system_clock())?;
    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    match tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            let handle = axum_server::Handle::new();
            let watcher = handle.clone();
            let token = shutdown.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                watcher.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
            });

            info!(%addr, "site auth core listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "site auth core listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => error!(error = %err, "failed to listen for ctrl-c"),
    }
    token.cancel();
}
