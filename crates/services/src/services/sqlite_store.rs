//! Document store backed by the local `content_items` table.

use async_trait::async_trait;
use db::{
    DBService,
    models::content_item::{ContentItem, UpsertContentItem},
};

use super::document_store::{
    CandidateQuery, CommitReceipt, DocumentPatch, DocumentSnapshot, DocumentStore,
    FeaturedCandidate, PatchSet, StoreError,
};

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: DBService,
}

impl SqliteDocumentStore {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }
}

impl From<&DocumentSnapshot> for UpsertContentItem {
    fn from(document: &DocumentSnapshot) -> Self {
        Self {
            id: document.id.clone(),
            collection: document.collection.clone(),
            title: document.title.clone().unwrap_or_default(),
            published_at: document.published_at,
            is_featured: document.is_featured,
        }
    }
}

impl From<ContentItem> for FeaturedCandidate {
    fn from(item: ContentItem) -> Self {
        Self {
            id: item.id,
            published_at: item.published_at,
            revision: Some(item.revision),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn query_featured(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<FeaturedCandidate>, StoreError> {
        let items = ContentItem::find_featured(
            &self.db.pool,
            &query.collection,
            query.exclude_id.as_deref(),
            query.limit.map(|limit| limit as i64),
        )
        .await?;

        Ok(items.into_iter().map(FeaturedCandidate::from).collect())
    }

    async fn commit(&self, patch: &DocumentPatch) -> Result<CommitReceipt, StoreError> {
        let PatchSet::IsFeatured(is_featured) = patch.set;

        let updated = ContentItem::set_featured(
            &self.db.pool,
            &patch.id,
            is_featured,
            patch.if_revision.as_deref(),
        )
        .await?;

        match updated {
            Some(item) => Ok(CommitReceipt {
                id: item.id,
                revision: Some(item.revision),
            }),
            // Nothing matched: tell a stale revision apart from a missing row
            None => match ContentItem::find_by_id(&self.db.pool, &patch.id).await? {
                Some(_) => Err(StoreError::RevisionConflict {
                    id: patch.id.clone(),
                }),
                None => Err(StoreError::NotFound {
                    id: patch.id.clone(),
                }),
            },
        }
    }

    async fn sync_document(&self, document: &DocumentSnapshot) -> Result<(), StoreError> {
        ContentItem::upsert(&self.db.pool, &UpsertContentItem::from(document)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    async fn seeded_store() -> SqliteDocumentStore {
        let db = DBService::new_in_memory().await.unwrap();
        for (id, month) in [("jan", 1), ("feb", 2), ("mar", 3)] {
            ContentItem::upsert(
                &db.pool,
                &UpsertContentItem::new(id, "news", id)
                    .published_at(Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap())
                    .featured(true),
            )
            .await
            .unwrap();
        }
        SqliteDocumentStore::new(db)
    }

    #[tokio::test]
    async fn test_query_excludes_and_limits() {
        let store = seeded_store().await;
        let candidates = store
            .query_featured(&CandidateQuery::featured_in("news").excluding("jan").limit(1))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "feb");
        assert!(candidates[0].revision.is_some());
    }

    #[tokio::test]
    async fn test_commit_outcomes() {
        let store = seeded_store().await;
        let current = store
            .query_featured(&CandidateQuery::featured_in("news"))
            .await
            .unwrap();
        let jan = current.iter().find(|c| c.id == "jan").unwrap();

        let stale = store
            .commit(&DocumentPatch::unfeature("jan").if_revision("stale"))
            .await;
        assert!(matches!(stale, Err(StoreError::RevisionConflict { .. })));

        let receipt = store
            .commit(&DocumentPatch::unfeature("jan").if_revision(jan.revision.clone().unwrap()))
            .await
            .unwrap();
        assert_eq!(receipt.id, "jan");

        // Unfeaturing twice is accepted
        assert!(store.commit(&DocumentPatch::unfeature("jan")).await.is_ok());

        let missing = store.commit(&DocumentPatch::unfeature("nope")).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));

        let item = ContentItem::find_by_id(&store.db().pool, "jan").await.unwrap().unwrap();
        assert!(!item.is_featured);
    }

    #[tokio::test]
    async fn test_synced_document_becomes_candidate() {
        let store = seeded_store().await;
        store
            .sync_document(&DocumentSnapshot {
                id: "old".to_string(),
                collection: "news".to_string(),
                title: Some("Season preview".to_string()),
                published_at: Some(Utc.with_ymd_and_hms(2023, 8, 1, 0, 0, 0).unwrap()),
                is_featured: true,
            })
            .await
            .unwrap();

        let candidates = store
            .query_featured(&CandidateQuery::featured_in("news"))
            .await
            .unwrap();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0].id, "old");

        let item = ContentItem::find_by_id(&store.db().pool, "old").await.unwrap().unwrap();
        assert_eq!(item.title, "Season preview");
    }
}
