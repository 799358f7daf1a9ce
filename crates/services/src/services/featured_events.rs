//! Background worker that runs featured limit enforcement for incoming
//! feature-marking events, one at a time.

use std::{sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    document_store::DocumentStore,
    featured_limit::{DemotionResult, FeaturedCaps, FeaturedLimitError, FeaturedLimiter},
};

const QUEUE_CAPACITY: usize = 256;

/// A document was marked featured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedEvent {
    pub collection: String,
    pub document_id: String,
}

impl FeaturedEvent {
    pub fn new(collection: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document_id: document_id.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("featured event queue is full")]
    QueueFull,
    #[error("featured event worker has stopped")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct FeaturedEventSender {
    tx: mpsc::Sender<FeaturedEvent>,
}

impl FeaturedEventSender {
    /// Non-blocking enqueue, for request handlers
    pub fn try_enqueue(&self, event: FeaturedEvent) -> Result<(), EnqueueError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    pub async fn enqueue(&self, event: FeaturedEvent) -> Result<(), EnqueueError> {
        self.tx.send(event).await.map_err(|_| EnqueueError::Closed)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_times: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_times: 3,
        }
    }
}

pub struct FeaturedEventWorker<S: ?Sized> {
    limiter: FeaturedLimiter<S>,
    caps: FeaturedCaps,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<S: DocumentStore + ?Sized + 'static> FeaturedEventWorker<S> {
    /// Spawn the worker. It stops once every sender is dropped or `cancel` fires.
    pub fn spawn(
        limiter: FeaturedLimiter<S>,
        caps: FeaturedCaps,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> (FeaturedEventSender, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = Self {
            limiter,
            caps,
            retry,
            cancel,
        };
        let handle = tokio::spawn(async move {
            worker.run(rx).await;
        });
        (FeaturedEventSender { tx }, handle)
    }

    async fn run(self, mut rx: mpsc::Receiver<FeaturedEvent>) {
        info!("Starting featured event worker");

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match self.handle(&event).await {
                Ok(DemotionResult { demoted: Some(id) }) => {
                    info!(
                        collection = %event.collection,
                        document_id = %event.document_id,
                        demoted_id = %id,
                        "Featured event processed"
                    );
                }
                Ok(DemotionResult { demoted: None }) => {
                    debug!(
                        collection = %event.collection,
                        document_id = %event.document_id,
                        "Featured event processed, nothing to demote"
                    );
                }
                // The feature write itself stands; the next event will try again
                Err(e) => {
                    warn!(
                        collection = %event.collection,
                        document_id = %event.document_id,
                        error = %e,
                        "Featured limit enforcement failed"
                    );
                }
            }
        }

        info!("Featured event worker stopped");
    }

    async fn handle(&self, event: &FeaturedEvent) -> Result<DemotionResult, FeaturedLimitError> {
        let max_featured = self.caps.for_collection(&event.collection);

        (|| async {
            self.limiter
                .enforce_limit_with_cancel(
                    &event.collection,
                    &event.document_id,
                    max_featured,
                    &self.cancel,
                )
                .await
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(self.retry.min_delay)
                .with_max_delay(self.retry.max_delay)
                .with_max_times(self.retry.max_times)
                .with_jitter(),
        )
        .when(|e: &FeaturedLimitError| e.should_retry())
        .notify(|e, dur| {
            warn!(
                collection = %event.collection,
                document_id = %event.document_id,
                "Featured limit enforcement failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                e
            )
        })
        .await
    }
}
