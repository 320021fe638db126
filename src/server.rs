//!
//! goalmusic HTTP server
//! ---------------------
//! Axum router for the users API plus the process lifecycle around it.
//!
//! Responsibilities:
//! - Open the users collection once at startup and hand it to handlers via `AppState`.
//! - Mount the `/users` routes (see `handlers`).
//! - Shut down gracefully on Ctrl-C / SIGTERM, then flush the collection.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::routing::{get, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::storage::{MemoryCollection, SharedCollection, UserCollection};

pub mod handlers;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: SharedCollection,
}

impl AppState {
    pub fn new(users: SharedCollection) -> Self {
        Self { users }
    }
}

/// Build the full router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "goalmusic ok" }))
        .route(
            "/users/",
            put(handlers::create_or_update_user)
                .get(handlers::get_users)
                .delete(handlers::delete_users),
        )
        .route(
            "/users",
            put(handlers::create_or_update_user)
                .get(handlers::get_users)
                .delete(handlers::delete_users),
        )
        .route(
            "/users/{user_id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .with_state(state)
}

/// Open the users collection described by `cfg`.
pub fn open_collection(cfg: &ServerConfig) -> anyhow::Result<SharedCollection> {
    match &cfg.data_file {
        Some(path) => {
            let coll = MemoryCollection::open_with_interval(path, cfg.persist_interval())
                .with_context(|| format!("While opening users collection at {}", path.display()))?;
            Ok(SharedCollection::new(coll))
        }
        None => {
            info!(target: "startup", "no data file configured, users are kept in memory only");
            Ok(SharedCollection::in_memory())
        }
    }
}

/// Serve `users` on `listener` until `shutdown` resolves, then flush the collection.
pub async fn serve<F>(listener: TcpListener, users: SharedCollection, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppState::new(users.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;
    info!(target: "goalmusic::server", "server stopped, flushing users collection");
    users.flush().await.context("While flushing users collection")?;
    Ok(())
}

/// Start the server described by `cfg` and run until a shutdown signal.
pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "goalmusic starting: host={}, http_port={}, data_file={:?}, persist_interval_ms={}",
        cfg.host, cfg.http_port, cfg.data_file, cfg.persist_interval_ms
    );
    let users = open_collection(&cfg)?;
    let addr: SocketAddr = cfg.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on {}", addr);
    serve(listener, users, shutdown_signal()).await
}

/// Convenience entry point using defaults (0.0.0.0:8000, in-memory).
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::default()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
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
    info!(target: "goalmusic::server", "shutdown signal received");
}
