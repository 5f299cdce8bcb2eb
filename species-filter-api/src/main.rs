//! Species Filter - Main Application Entry Point
//!
//! Serves the filter management and application API over a
//! configurable observation store.

use species_filter_api::{AppState, ServerConfig, StorageKind};
use species_filter_storage::Storage;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,species_filter=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!("Starting Species Filter server on {}", config.bind_address());

    let storage: Arc<dyn Storage> = match config.storage {
        StorageKind::Couchbase => {
            #[cfg(feature = "couchbase")]
            {
                use species_filter_storage::CouchbaseStorage;
                tracing::info!("Initializing Couchbase storage...");
                let store = CouchbaseStorage::new(config.couchbase.clone().into()).await?;
                Arc::new(store)
            }
            #[cfg(not(feature = "couchbase"))]
            {
                anyhow::bail!("Couchbase storage requested but 'couchbase' feature not enabled");
            }
        }
        StorageKind::Memory => {
            tracing::info!("Initializing InMemory storage...");
            Arc::new(species_filter_storage::InMemoryStorage::new())
        }
    };

    let app_state = Arc::new(AppState::with_storage(storage));
    let app = species_filter_api::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
