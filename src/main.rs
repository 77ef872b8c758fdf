use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use movie_catalog::config::{Config, StoreBackendKind};
use movie_catalog::handlers::CatalogService;
use movie_catalog::server::{self, AppState};
use movie_catalog::store::{MemoryBackend, PostgresBackend, RecordBackend, RecordStore};
use movie_catalog::translator::OpenAiTranslator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("movie_catalog=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting movie catalog ({:?} store, region {}, {:?} translation policy)",
        config.store_backend, config.store_region, config.failure_policy
    );

    let backend: Arc<dyn RecordBackend> = match config.store_backend {
        StoreBackendKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL not set")?;
            Arc::new(PostgresBackend::connect(url, &config.table_name).await?)
        }
        StoreBackendKind::Memory => {
            info!("Using in-memory record store; data is lost on exit");
            Arc::new(MemoryBackend::new())
        }
    };

    let translator = OpenAiTranslator::from_config(&config)
        .context("Failed to build translator client")?;

    let store = RecordStore::new(backend, config.page_size);
    let (service, worker) = CatalogService::new(store, Arc::new(translator), config.failure_policy);

    let app = server::router(AppState::new(service.clone(), config.api_key.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    // Give queued translation cache writes a chance to land
    service.flush_pending_writes().await;
    drop(service);
    worker.abort();
    info!("Stopped");
    Ok(())
}
