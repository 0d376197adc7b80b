use std::path::Path;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use thiserror::Error;
use tokio::signal::ctrl_c;

use crate::{
    actions::{ingredients, users},
    config::{Config, ConfigError},
    error::ApiError,
    routes::routes,
    schema::{UserAccount, UserRole},
    state::AppState,
    validation::NewUserPayload,
};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind server: {0}")]
    Bind(#[from] warp::Error),
}

/// Connects to the database and applies pending migrations.
pub async fn connect(config: &Config) -> Result<Pool<Postgres>, ServerError> {
    log::info!(
        "Connecting to database (max {} connections)",
        config.db_max_connections
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations applied");

    Ok(pool)
}

pub async fn serve(config: Config) -> Result<(), ServerError> {
    let pool = connect(&config).await?;

    tokio::fs::create_dir_all(&config.media_root).await?;
    let state = AppState::new(pool.clone(), &config)?;

    let (address, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(config.address(), shutdown_signal())?;
    log::info!("Server running on http://{address}");

    server.await;

    pool.close().await;
    log::info!("Server shut down");
    Ok(())
}

/// Imports `name,measurement_unit` rows from a CSV file.
pub async fn load_ingredients(config: &Config, path: &Path) -> Result<u64, ServerError> {
    let data = tokio::fs::read_to_string(path).await?;
    let (rows, skipped) = ingredients::parse_ingredient_csv(&data);
    for line in &skipped {
        log::warn!("Skipping malformed line {line} in {}", path.display());
    }

    let pool = connect(config).await?;
    let added = ingredients::import_ingredients(&rows, &pool).await?;
    log::info!(
        "Loaded {added} new ingredients ({} rows read, {} skipped)",
        rows.len(),
        skipped.len()
    );

    pool.close().await;
    Ok(added)
}

pub async fn create_admin(
    config: &Config,
    payload: NewUserPayload,
) -> Result<UserAccount, ServerError> {
    let user = payload.validate().map_err(ApiError::from)?;

    let pool = connect(config).await?;
    let account = users::register_user(&user, UserRole::Admin, &pool).await?;
    log::info!("Created administrator {} ({})", account.username, account.id);

    pool.close().await;
    Ok(account)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await
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
