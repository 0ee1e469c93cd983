use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod audit;
mod auth;
mod backup;
mod config;
mod db;
mod error;
mod flight_status;
mod import;
mod journey;
mod model;
mod service;
mod store;

use auth::{JwtConfig, PermissionMatrix};
use config::{DatabaseSettings, Settings, StorageBackend};
use flight_status::FlightStatusService;
use store::Stores;

/// Open both databases, apply their migrations and wrap them as stores.
async fn connect_stores(settings: &DatabaseSettings) -> Result<Stores> {
    match settings.backend {
        StorageBackend::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            Ok(Stores::in_memory())
        }
        StorageBackend::Postgres => {
            let business_url = settings
                .url
                .as_deref()
                .ok_or_else(|| anyhow!("database.url must be set (TOURDESK__DATABASE__URL)"))?;
            let audit_url = match settings.audit_url.as_deref() {
                Some(url) => url,
                None => {
                    warn!("database.audit_url is not set; audit log shares the business database");
                    business_url
                }
            };

            if let Some(admin_url) = settings.admin_url.as_deref() {
                db::migrate_business_as_admin(admin_url).await?;
            }

            let business = db::init_pool("business", business_url, settings.max_connections).await?;
            let audit = db::init_pool("audit", audit_url, settings.max_connections).await?;

            if settings.admin_url.is_some() {
                db::migrate_audit(&audit).await?;
            } else {
                db::run_migrations(&business, &audit).await?;
            }

            Ok(Stores::postgres(business, audit))
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables from .env file
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tourdesk=debug")),
        )
        .init();

    info!("Starting tourdesk");

    let settings = Settings::load()?;

    let permissions = Arc::new(PermissionMatrix::load(settings.permissions.path.as_deref())?);
    info!(
        "Permission matrix loaded for roles: {}",
        permissions.roles().collect::<Vec<_>>().join(", ")
    );

    let stores = connect_stores(&settings.database).await?;

    info!("Initializing JWT configuration");
    let jwt_config = JwtConfig::from_settings(&settings.auth)?;

    let flight_status = FlightStatusService::from_settings(&settings.flight_status)?;

    let state = api::AppState::new(stores, permissions, jwt_config, flight_status)?;
    info!("Services initialized");

    if let Some(admin) = state.auth.bootstrap_admin(&settings.bootstrap).await? {
        info!("Bootstrap administrator ready: {}", admin.email);
    }

    let app = api::router(state, &settings.server);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}
