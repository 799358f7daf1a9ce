//! Contract for the content repository that holds the featured flags.
//!
//! The store is the single source of truth for which documents are featured.
//! Callers read candidates with [`DocumentStore::query_featured`] and write
//! single-field patches with [`DocumentStore::commit`]. Stores that mirror the
//! CMS are fed through [`DocumentStore::sync_document`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

pub const FEATURED_FIELD: &str = "isFeatured";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("unauthorized")]
    Unauthorized,
    #[error("json error: {0}")]
    Serde(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("revision conflict on document {id}")]
    RevisionConflict { id: String },
    #[error("document not found: {id}")]
    NotFound { id: String },
}

impl StoreError {
    /// Returns true if the error is transient and the operation can be re-run.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::RevisionConflict { .. } => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            Self::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

/// A featured document as seen by the limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FeaturedCandidate {
    pub id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub revision: Option<String>,
}

/// Featured documents of one collection, oldest `published_at` first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub collection: String,
    pub exclude_id: Option<String>,
    pub limit: Option<usize>,
}

impl CandidateQuery {
    pub fn featured_in(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            exclude_id: None,
            limit: None,
        }
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The single field a patch sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSet {
    IsFeatured(bool),
}

impl PatchSet {
    pub fn field(&self) -> &'static str {
        match self {
            PatchSet::IsFeatured(_) => FEATURED_FIELD,
        }
    }

    pub fn value(&self) -> serde_json::Value {
        match self {
            PatchSet::IsFeatured(value) => serde_json::Value::Bool(*value),
        }
    }
}

/// Single-document, single-field write, optionally conditional on a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPatch {
    pub id: String,
    pub set: PatchSet,
    pub if_revision: Option<String>,
}

impl DocumentPatch {
    pub fn new(id: impl Into<String>, set: PatchSet) -> Self {
        Self {
            id: id.into(),
            set,
            if_revision: None,
        }
    }

    pub fn unfeature(id: impl Into<String>) -> Self {
        Self::new(id, PatchSet::IsFeatured(false))
    }

    pub fn if_revision(mut self, revision: impl Into<String>) -> Self {
        self.if_revision = Some(revision.into());
        self
    }
}

/// Upstream state of one document, as delivered by a CMS webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub collection: String,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
}

/// Acknowledgement of a committed patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub id: String,
    pub revision: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query_featured(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<FeaturedCandidate>, StoreError>;

    async fn commit(&self, patch: &DocumentPatch) -> Result<CommitReceipt, StoreError>;

    /// Mirror an upstream document. The CMS store itself keeps this a no-op.
    async fn sync_document(&self, _document: &DocumentSnapshot) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        assert!(StoreError::Timeout.should_retry());
        assert!(StoreError::RateLimited.should_retry());
        assert!(StoreError::RevisionConflict { id: "a".into() }.should_retry());
        assert!(
            StoreError::Http {
                status: 503,
                body: String::new()
            }
            .should_retry()
        );
        assert!(
            !StoreError::Http {
                status: 400,
                body: String::new()
            }
            .should_retry()
        );
        assert!(!StoreError::Unauthorized.should_retry());
        assert!(!StoreError::NotFound { id: "a".into() }.should_retry());
    }

    #[test]
    fn test_patch_builder() {
        let patch = DocumentPatch::unfeature("news-1").if_revision("rev-9");
        assert_eq!(patch.set.field(), "isFeatured");
        assert_eq!(patch.set.value(), serde_json::Value::Bool(false));
        assert_eq!(patch.if_revision.as_deref(), Some("rev-9"));
    }
}
