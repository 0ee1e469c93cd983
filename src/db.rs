use anyhow::{Context, Result};
use sqlx::{
    Connection, PgConnection, PgPool,
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::str::FromStr;
use tracing::info;

/// Initialize a connection pool for one of the two databases
pub async fn init_pool(label: &str, database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Initializing {} database connection pool", label);

    // Parse the connection string
    let options = PgConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid {label} database url"))?;

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to the {label} database"))?;

    info!("{} database connection pool initialized", label);
    Ok(pool)
}

/// Create a single admin database connection for migrations
pub async fn create_admin_connection(database_admin_url: &str) -> Result<PgConnection> {
    info!("Creating admin database connection for migrations");

    let options =
        PgConnectOptions::from_str(database_admin_url).context("invalid admin database url")?;
    let conn = PgConnection::connect_with(&options)
        .await
        .context("failed to open admin database connection")?;

    info!("Admin database connection established");
    Ok(conn)
}

// Both sets may share one database when no separate audit url is configured,
// so each ignores the other's applied versions.
fn business_migrator() -> Migrator {
    let mut migrator = sqlx::migrate!("./sql/migrations/business");
    migrator.set_ignore_missing(true);
    migrator
}

fn audit_migrator() -> Migrator {
    let mut migrator = sqlx::migrate!("./sql/migrations/audit");
    migrator.set_ignore_missing(true);
    migrator
}

/// Business schema through a privileged connection
pub async fn migrate_business_as_admin(admin_url: &str) -> Result<()> {
    let mut admin_conn = create_admin_connection(admin_url).await?;

    info!("Running business migrations with admin privileges");
    business_migrator()
        .run(&mut admin_conn)
        .await
        .context("business migrations failed")?;

    info!("Closing admin database connection");
    let _ = admin_conn.close().await;
    Ok(())
}

pub async fn migrate_business(pool: &PgPool) -> Result<()> {
    info!("Running business migrations");
    business_migrator().run(pool).await.context("business migrations failed")?;
    Ok(())
}

pub async fn migrate_audit(pool: &PgPool) -> Result<()> {
    info!("Running audit log migrations");
    audit_migrator().run(pool).await.context("audit migrations failed")?;
    Ok(())
}

pub async fn run_migrations(business: &PgPool, audit: &PgPool) -> Result<()> {
    migrate_business(business).await?;
    migrate_audit(audit).await?;
    info!("Migrations completed successfully");
    Ok(())
}
