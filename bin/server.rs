// Parish Office - Web Server

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parish_office::entities::ministry;
use parish_office::web::{router, AppState};
use parish_office::{auth, finance, open_database, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database = %config.database_path.display(),
        uploads = %config.uploads_dir.display(),
        listen_addr = %config.server.listen_addr,
        listen_port = config.server.listen_port,
        email_enabled = config.messaging.email.transport.is_enabled(),
        sms_enabled = config.messaging.sms.is_enabled(),
    );

    let conn = open_database(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    finance::load_config(&conn)?;
    ministry::seed_defaults(&conn)?;
    if config.bootstrap.is_configured() {
        auth::ensure_admin(
            &conn,
            &config.bootstrap.admin_name,
            &config.bootstrap.admin_email,
            &config.bootstrap.admin_password,
        )
        .context("creating bootstrap admin")?;
    }
    std::fs::create_dir_all(&config.uploads_dir)
        .with_context(|| format!("creating {}", config.uploads_dir.display()))?;
    if config.server.secret_key.is_empty() {
        warn!("server.secret_key is empty; session digests are unkeyed");
    }

    let addr = SocketAddr::from((config.server.listen_addr, config.server.listen_port));
    let state = AppState::new(conn, config)?;
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
