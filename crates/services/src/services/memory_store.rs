//! Process-local document store, used for previews and tests.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    document_store::{
        CandidateQuery, CommitReceipt, DocumentPatch, DocumentStore, DocumentSnapshot,
        FeaturedCandidate, PatchSet, StoreError,
    },
    featured_limit::sort_oldest_first,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub collection: String,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub revision: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<BTreeMap<String, StoredDocument>>,
    queries: AtomicUsize,
    commits: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, BTreeMap<String, StoredDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(
        &self,
        id: impl Into<String>,
        collection: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
        is_featured: bool,
    ) {
        let id = id.into();
        self.documents().insert(
            id.clone(),
            StoredDocument {
                id,
                collection: collection.into(),
                published_at,
                is_featured,
                revision: 1,
            },
        );
    }

    /// Editor-side flag change. Not counted as a commit.
    pub fn set_featured(&self, id: &str, is_featured: bool) -> bool {
        match self.documents().get_mut(id) {
            Some(doc) => {
                doc.is_featured = is_featured;
                doc.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<StoredDocument> {
        self.documents().get(id).cloned()
    }

    pub fn featured_ids(&self, collection: &str) -> Vec<String> {
        self.documents()
            .values()
            .filter(|doc| doc.collection == collection && doc.is_featured)
            .map(|doc| doc.id.clone())
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query_featured(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<FeaturedCandidate>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let mut candidates: Vec<FeaturedCandidate> = self
            .documents()
            .values()
            .filter(|doc| doc.collection == query.collection && doc.is_featured)
            .filter(|doc| query.exclude_id.as_deref() != Some(doc.id.as_str()))
            .map(|doc| FeaturedCandidate {
                id: doc.id.clone(),
                published_at: doc.published_at,
                revision: Some(doc.revision.to_string()),
            })
            .collect();

        sort_oldest_first(&mut candidates);
        if let Some(limit) = query.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    async fn commit(&self, patch: &DocumentPatch) -> Result<CommitReceipt, StoreError> {
        let mut documents = self.documents();
        let doc = documents
            .get_mut(&patch.id)
            .ok_or_else(|| StoreError::NotFound {
                id: patch.id.clone(),
            })?;

        if patch
            .if_revision
            .as_ref()
            .is_some_and(|expected| *expected != doc.revision.to_string())
        {
            return Err(StoreError::RevisionConflict {
                id: patch.id.clone(),
            });
        }

        match patch.set {
            PatchSet::IsFeatured(value) => doc.is_featured = value,
        }
        doc.revision += 1;
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(CommitReceipt {
            id: doc.id.clone(),
            revision: Some(doc.revision.to_string()),
        })
    }

    async fn sync_document(&self, document: &DocumentSnapshot) -> Result<(), StoreError> {
        self.documents()
            .entry(document.id.clone())
            .and_modify(|doc| {
                doc.collection = document.collection.clone();
                doc.published_at = document.published_at;
                doc.is_featured = document.is_featured;
                doc.revision += 1;
            })
            .or_insert_with(|| StoredDocument {
                id: document.id.clone(),
                collection: document.collection.clone(),
                published_at: document.published_at,
                is_featured: document.is_featured,
                revision: 1,
            });
        Ok(())
    }
}
