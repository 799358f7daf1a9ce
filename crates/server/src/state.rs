use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use services::services::{
    document_store::DocumentStore,
    featured_events::FeaturedEventSender,
    featured_limit::{FeaturedCaps, FeaturedLimiter},
    memory_store::InMemoryDocumentStore,
    sanity::SanityClient,
    sqlite_store::SqliteDocumentStore,
};
use tracing::info;

use crate::config::{Config, StoreBackend};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub limiter: FeaturedLimiter<dyn DocumentStore>,
    pub caps: FeaturedCaps,
    pub events: FeaturedEventSender,
    pub webhook_secret: Option<String>,
    pub signature_tolerance_ms: Option<i64>,
}

impl AppState {
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.limiter.store()
    }
}

/// Connect the configured document store
pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            let db = DBService::new(&config.database_url)
                .await
                .with_context(|| format!("opening database {}", config.database_url))?;
            Arc::new(SqliteDocumentStore::new(db))
        }
        StoreBackend::Sanity => {
            let sanity = config
                .sanity
                .clone()
                .context("sanity backend selected without SANITY_PROJECT_ID")?;
            Arc::new(SanityClient::new(sanity)?)
        }
        StoreBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
    };
    info!(backend = %config.store_backend, "Document store ready");
    Ok(store)
}
