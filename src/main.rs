use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use pizza_pantry as api;

const REPLAY_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);
    api::handlers::health::init_start_time();

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let db = Arc::new(db_pool);
    let state = api::AppState::new(db.clone(), cfg).context("failed to build application state")?;

    let replay_guard = state.replay_guard.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REPLAY_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            replay_guard.cleanup();
        }
    });

    let app = api::build_router(state);

    info!("pizza-pantry listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(db) {
        Ok(pool) => {
            if let Err(e) = api::db::close_pool(pool).await {
                warn!("Error closing database pool: {}", e);
            }
        }
        Err(_) => warn!("Database pool still shared at shutdown; leaving it to drop"),
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
    info!("Shutdown signal received");
}
