// src/main.rs
use anyhow::Context;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use packship::api;
use packship::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = env_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!(error = %err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let shipping_config = app_config.shipping.clone();

    tracing::info!(
        consolidation = %shipping_config.allocator_config().consolidation,
        default_pack_sizes = shipping_config.default_pack_sizes().is_some(),
        "shipping service starting"
    );

    let addr = api_config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind API server to {addr}"))?;
    api::log_endpoints(&api_config);

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    };
    let mut server = tokio::spawn(api::serve(listener, shipping_config, shutdown));

    // Wait for a signal, or for the server to stop on its own.
    tokio::select! {
        signalled = signalled_rx => {
            if signalled.is_ok() {
                tracing::info!("shutdown signal received, draining in-flight requests");
            }
        }
        result = &mut server => {
            return result
                .context("API server task failed")?
                .context("API server terminated with an error");
        }
    }

    match tokio::time::timeout(api_config.shutdown_timeout(), server).await {
        Ok(result) => {
            result
                .context("API server task failed")?
                .context("failed to shut down the API server")?;
            tracing::info!("server shut down successfully");
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = api_config.shutdown_timeout().as_secs(),
                "in-flight requests did not finish in time, stopping anyway"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
