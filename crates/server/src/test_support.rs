use std::sync::Arc;

use chrono::{TimeZone, Utc};
use services::services::{
    document_store::DocumentStore,
    featured_events::{FeaturedEventWorker, RetryPolicy},
    featured_limit::{FeaturedCaps, FeaturedLimiter},
    memory_store::InMemoryDocumentStore,
};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryDocumentStore>,
}

impl TestApp {
    /// News collection with Jan..Apr featured and `E` just marked featured
    pub fn with_match_week() -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        for (id, month) in [("jan", 1), ("feb", 2), ("mar", 3), ("apr", 4), ("E", 5)] {
            store.insert(
                id,
                "news",
                Some(Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()),
                true,
            );
        }

        let dyn_store: Arc<dyn DocumentStore> = store.clone();
        let limiter = FeaturedLimiter::new(dyn_store);
        let caps = FeaturedCaps::default();
        let (events, _worker) = FeaturedEventWorker::spawn(
            limiter.clone(),
            caps.clone(),
            RetryPolicy::default(),
            CancellationToken::new(),
        );

        let state = AppState {
            limiter,
            caps,
            events,
            webhook_secret: None,
            signature_tolerance_ms: Some(60_000),
        };
        Self { state, store }
    }

    pub fn with_secret(mut self, secret: &str) -> Self {
        self.state.webhook_secret = Some(secret.to_string());
        self
    }
}
