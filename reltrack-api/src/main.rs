//! # Reltrack API Server
//!
//! Tracks releases of the packages a team depends on. Users upload a
//! `requirements.txt` or `pyproject.toml`, review what the package registry
//! says about each dependency, and import the rows they care about.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p reltrack-api
//! ```
//!
//! Without `DATABASE_URL` the server keeps everything in memory.

use anyhow::Context;
use reltrack_api::{
    app::{build_router, AppState},
    bootstrap,
    config::Config,
};
use reltrack_shared::db::migrations::{ensure_database_exists, run_migrations};
use reltrack_shared::db::pool::{create_pool, DatabaseConfig};
use reltrack_shared::registry::PypiClient;
use reltrack_shared::store::{MemoryStore, PgStore, ReleaseStore, UserStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reltrack_api=debug,reltrack_shared=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Reltrack API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let (releases, users): (Arc<dyn ReleaseStore>, Arc<dyn UserStore>) = match &config.database {
        Some(database) => {
            ensure_database_exists(&database.url)
                .await
                .context("Failed to create database")?;

            let pool = create_pool(DatabaseConfig {
                url: database.url.clone(),
                max_connections: database.max_connections,
                ..Default::default()
            })
            .await
            .context("Failed to connect to database")?;

            run_migrations(&pool).await.context("Failed to run migrations")?;

            let store = Arc::new(PgStore::new(pool));
            (store.clone(), store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage, nothing will survive a restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap::ensure_admin(users.as_ref(), admin)
            .await
            .context("Failed to provision bootstrap admin")?;
    }

    let registry = PypiClient::new(&config.registry.base_url, config.registry.lookup_timeout())
        .context("Failed to build registry client")?;
    tracing::info!(
        registry = %registry.base_url(),
        max_concurrency = config.registry.max_concurrency,
        "Registry client ready"
    );

    let addr = config.bind_address();
    let state = AppState::new(config, releases, users, Arc::new(registry));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
