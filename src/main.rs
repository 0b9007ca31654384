use bridgepoint_api::{
    AppState,
    bootstrap::{self, BootstrapOutcome},
    config::{AppConfig, Env},
    create_router, error,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    storage::{LocalDiskStorage, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects persistence and storage, creates the
/// first admin if needed, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast for missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise crate debug + request summaries.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bridgepoint_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    error::expose_error_details(!config.is_production());
    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Persistence
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.migrate()
                .await
                .expect("FATAL: Failed to apply database migrations.");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Upload storage
    let disk = LocalDiskStorage::new(config.upload_dir.clone());
    disk.ensure_ready()
        .await
        .expect("FATAL: Upload directory is not writable. Check UPLOAD_DIR.");
    tracing::info!(path = %disk.root().display(), "serving uploads from disk");
    let storage = Arc::new(disk) as StorageState;

    // 5. First admin
    match bootstrap::ensure_admin(&repo, &config).await {
        Ok(BootstrapOutcome::Created(username)) => {
            tracing::info!(%username, "created initial admin account");
        }
        Ok(_) => {}
        Err(e) => panic!("FATAL: Failed to bootstrap the admin account: {e}"),
    }

    // 6. Router and server
    let port = config.port;
    let app = create_router(AppState {
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("FATAL: Failed to bind the HTTP port. Check PORT.");

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
