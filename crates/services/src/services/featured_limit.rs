//! Keeps the number of featured documents per collection under a cap.
//!
//! Enforcement is advisory: it runs after a document has been marked featured
//! and demotes at most one older document per call. The store is re-read on
//! every call, so the limiter holds no state of its own.
//!
//! Two calls racing on the same collection may both read the same snapshot and
//! pick the same victim, or neither may see the other's write. The optional
//! revision guard turns the first case into a retryable conflict.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use ts_rs::TS;

use super::document_store::{
    CandidateQuery, DocumentPatch, DocumentStore, FeaturedCandidate, StoreError,
};

pub const DEFAULT_MAX_FEATURED: usize = 4;

#[derive(Debug, Error)]
pub enum FeaturedLimitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("store read failed: {0}")]
    StoreRead(#[source] StoreError),
    #[error("store write failed for {id}: {source}")]
    StoreWrite {
        id: String,
        #[source]
        source: StoreError,
    },
    #[error("featured limit enforcement cancelled")]
    Cancelled,
    #[error("featured limit enforcement timed out")]
    TimedOut,
}

impl FeaturedLimitError {
    /// Enforcement is idempotent, so any transient failure can be re-run as a whole.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::StoreRead(source) | Self::StoreWrite { source, .. } => source.should_retry(),
            Self::TimedOut => true,
            Self::InvalidArgument(_) | Self::Cancelled => false,
        }
    }
}

/// Outcome of one enforcement pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DemotionResult {
    pub demoted: Option<String>,
}

impl DemotionResult {
    pub fn none() -> Self {
        Self { demoted: None }
    }

    pub fn demoted(id: impl Into<String>) -> Self {
        Self {
            demoted: Some(id.into()),
        }
    }
}

/// Featured cap per collection, with a default for collections not listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedCaps {
    default: usize,
    overrides: HashMap<String, usize>,
}

impl Default for FeaturedCaps {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURED)
    }
}

impl FeaturedCaps {
    pub fn new(default: usize) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, collection: impl Into<String>, cap: usize) -> Self {
        self.overrides.insert(collection.into(), cap);
        self
    }

    pub fn for_collection(&self, collection: &str) -> usize {
        self.overrides
            .get(collection)
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Clone)]
pub struct LimiterOptions {
    /// Upper bound for each of the read and the write
    pub timeout: Duration,
    /// Make the demotion conditional on the revision that was read
    pub revision_guard: bool,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            revision_guard: true,
        }
    }
}

/// Oldest first: missing `published_at` sorts before any date, ties go to the
/// lexically smaller id.
pub fn sort_oldest_first(candidates: &mut [FeaturedCandidate]) {
    candidates.sort_by(|a, b| {
        a.published_at
            .cmp(&b.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub struct FeaturedLimiter<S: ?Sized> {
    store: Arc<S>,
    options: LimiterOptions,
}

impl<S: ?Sized> Clone for FeaturedLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> FeaturedLimiter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, LimiterOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: LimiterOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Demote the oldest other featured document of `collection` when at least
    /// `max_featured` others are featured. `just_featured_id` is never demoted.
    pub async fn enforce_limit(
        &self,
        collection: &str,
        just_featured_id: &str,
        max_featured: usize,
    ) -> Result<DemotionResult, FeaturedLimitError> {
        self.enforce_limit_with_cancel(
            collection,
            just_featured_id,
            max_featured,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn enforce_limit_with_cancel(
        &self,
        collection: &str,
        just_featured_id: &str,
        max_featured: usize,
        cancel: &CancellationToken,
    ) -> Result<DemotionResult, FeaturedLimitError> {
        validate(collection, just_featured_id, max_featured)?;

        let query = CandidateQuery::featured_in(collection).excluding(just_featured_id);
        let mut candidates = self
            .guarded(cancel, self.store.query_featured(&query))
            .await?
            .map_err(FeaturedLimitError::StoreRead)?;

        // Never trust the store's filter for the subject document
        candidates.retain(|candidate| candidate.id != just_featured_id);

        if candidates.len() < max_featured {
            debug!(
                collection = %collection,
                document_id = %just_featured_id,
                featured_others = candidates.len(),
                max_featured = max_featured,
                "Featured limit not reached"
            );
            return Ok(DemotionResult::none());
        }

        sort_oldest_first(&mut candidates);
        let Some(victim) = candidates.into_iter().next() else {
            return Ok(DemotionResult::none());
        };

        let mut patch = DocumentPatch::unfeature(victim.id.clone());
        if self.options.revision_guard {
            if let Some(revision) = victim.revision.clone() {
                patch = patch.if_revision(revision);
            }
        }

        self.guarded(cancel, self.store.commit(&patch))
            .await?
            .map_err(|source| FeaturedLimitError::StoreWrite {
                id: victim.id.clone(),
                source,
            })?;

        info!(
            collection = %collection,
            document_id = %just_featured_id,
            demoted_id = %victim.id,
            published_at = ?victim.published_at,
            "Featured limit reached, unfeatured oldest document"
        );

        Ok(DemotionResult::demoted(victim.id))
    }

    /// Race `fut` against cancellation and the configured timeout. Cancellation
    /// is checked first so a cancelled call never starts the wrapped I/O.
    async fn guarded<F, T>(&self, cancel: &CancellationToken, fut: F) -> Result<T, FeaturedLimitError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FeaturedLimitError::Cancelled),
            res = tokio::time::timeout(self.options.timeout, fut) => {
                res.map_err(|_| FeaturedLimitError::TimedOut)
            }
        }
    }
}

fn validate(
    collection: &str,
    just_featured_id: &str,
    max_featured: usize,
) -> Result<(), FeaturedLimitError> {
    if max_featured == 0 {
        return Err(FeaturedLimitError::InvalidArgument(
            "max_featured must be at least 1".to_string(),
        ));
    }
    if collection.trim().is_empty() {
        return Err(FeaturedLimitError::InvalidArgument(
            "collection must not be empty".to_string(),
        ));
    }
    if just_featured_id.trim().is_empty() {
        return Err(FeaturedLimitError::InvalidArgument(
            "just_featured_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
