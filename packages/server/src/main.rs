use std::net::SocketAddr;
use std::sync::Arc;

use common::storage::ObjectStore;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::s3::S3ObjectStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::{AppConfig, StorageBackend, StorageConfig};
use server::state::AppState;
use server::utils::notify::TracingNotifier;
use server::utils::rate_limit::FixedWindowLimiter;
use server::{database, seed};

async fn build_object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Filesystem => Ok(Arc::new(
            FilesystemObjectStore::new(config.root_dir.clone().into(), config.max_object_size)
                .await?,
        )),
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("storage.s3 section required for the s3 backend"))?;
            Ok(Arc::new(S3ObjectStore::new(
                &s3.bucket,
                &s3.region,
                s3.endpoint.as_deref(),
                &s3.access_key,
                &s3.secret_key,
                config.max_object_size,
            )?))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;

    let db = database::init_db(&config.database.url).await?;
    seed::ensure_indexes(&db).await?;

    let objects = build_object_store(&config.storage).await?;

    let public_rate_limiter = Arc::new(FixedWindowLimiter::per_minute(
        config.application.public_rate_limit_per_minute,
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        db,
        objects,
        notifier: Arc::new(TracingNotifier),
        public_rate_limiter,
        config: Arc::new(config),
    };

    let app = server::build_router(state);

    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
