//! services/api/src/bin/ingest.rs
//!
//! One-shot corpus build: loads `CONTENT_DIR`, chunks and embeds it, and
//! replaces the vector index. Exits non-zero when no index could be built.

use api_lib::{app::build_knowledge, config::Config, error::ApiError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Ingesting course content from {}", config.content_dir.display());

    let knowledge = build_knowledge(&config).await?;
    match knowledge.rebuild().await {
        Ok(report) => {
            println!(
                "Indexed {} passages ({} chunks from {} documents) into {}",
                report.entries,
                report.chunks,
                report.documents,
                config.vector_db_path.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Ingestion failed: {}", e);
            Err(e.into())
        }
    }
}
