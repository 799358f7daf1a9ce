use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"id, collection, title, published_at, is_featured, revision, created_at, updated_at"#;

/// A featurable piece of site content (news article, gallery item, ...)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ContentItem {
    pub id: String,
    pub collection: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub revision: String, // Replaced on every write, used for conditional patches
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpsertContentItem {
    pub id: String,
    pub collection: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
}

impl UpsertContentItem {
    pub fn new(id: impl Into<String>, collection: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            title: title.into(),
            published_at: None,
            is_featured: false,
        }
    }

    pub fn published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn featured(mut self, is_featured: bool) -> Self {
        self.is_featured = is_featured;
        self
    }
}

impl ContentItem {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ContentItem>(&format!(
            "SELECT {SELECT_COLUMNS} FROM content_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Featured items of a collection, oldest first. Items without a publish
    /// date come before dated ones; equal dates are ordered by id.
    pub async fn find_featured(
        pool: &SqlitePool,
        collection: &str,
        exclude_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ContentItem>(&format!(
            r#"SELECT {SELECT_COLUMNS}
            FROM content_items
            WHERE collection = $1
              AND is_featured = 1
              AND ($2 IS NULL OR id != $2)
            ORDER BY published_at IS NOT NULL, published_at ASC, id ASC
            LIMIT $3"#
        ))
        .bind(collection)
        .bind(exclude_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(pool)
        .await
    }

    /// Insert or replace the mirrored fields of an item. An empty title keeps
    /// the stored one.
    pub async fn upsert(pool: &SqlitePool, data: &UpsertContentItem) -> Result<Self, sqlx::Error> {
        let revision = Uuid::new_v4().to_string();
        sqlx::query_as::<_, ContentItem>(&format!(
            r#"INSERT INTO content_items (id, collection, title, published_at, is_featured, revision)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(id) DO UPDATE SET
                collection = excluded.collection,
                title = COALESCE(NULLIF(excluded.title, ''), content_items.title),
                published_at = excluded.published_at,
                is_featured = excluded.is_featured,
                revision = excluded.revision,
                updated_at = datetime('now', 'subsec')
            RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(&data.id)
        .bind(&data.collection)
        .bind(&data.title)
        .bind(data.published_at)
        .bind(data.is_featured)
        .bind(revision)
        .fetch_one(pool)
        .await
    }

    /// Set the featured flag. With `expected_revision` the write only applies
    /// when the stored revision still matches. Returns `None` when no row was
    /// updated (unknown id or stale revision).
    pub async fn set_featured(
        pool: &SqlitePool,
        id: &str,
        is_featured: bool,
        expected_revision: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let revision = Uuid::new_v4().to_string();
        sqlx::query_as::<_, ContentItem>(&format!(
            r#"UPDATE content_items
            SET is_featured = $2,
                revision = $3,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1
              AND ($4 IS NULL OR revision = $4)
            RETURNING {SELECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(is_featured)
        .bind(revision)
        .bind(expected_revision)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::DBService;

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_find_featured_orders_oldest_first() {
        let db = DBService::new_in_memory().await.unwrap();
        for data in [
            UpsertContentItem::new("b", "news", "Cup run").published_at(date(2024, 6, 1)).featured(true),
            UpsertContentItem::new("a", "news", "Derby").published_at(date(2024, 6, 1)).featured(true),
            UpsertContentItem::new("c", "news", "Kit launch").featured(true),
            UpsertContentItem::new("d", "news", "Old news").published_at(date(2023, 1, 1)),
            UpsertContentItem::new("e", "gallery", "Photos").featured(true),
        ] {
            ContentItem::upsert(&db.pool, &data).await.unwrap();
        }

        let featured = ContentItem::find_featured(&db.pool, "news", None, None).await.unwrap();
        let ids: Vec<_> = featured.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let featured = ContentItem::find_featured(&db.pool, "news", Some("c"), Some(1))
            .await
            .unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, "a");
    }

    #[tokio::test]
    async fn test_upsert_replaces_mirrored_fields() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = ContentItem::upsert(
            &db.pool,
            &UpsertContentItem::new("a", "news", "Derby").featured(true),
        )
        .await
        .unwrap();

        let second = ContentItem::upsert(
            &db.pool,
            &UpsertContentItem::new("a", "news", "").published_at(date(2024, 6, 1)),
        )
        .await
        .unwrap();
        assert_eq!(second.title, "Derby");
        assert!(!second.is_featured);
        assert_eq!(second.published_at, Some(date(2024, 6, 1)));
        assert_ne!(second.revision, first.revision);

        let featured = ContentItem::find_featured(&db.pool, "news", None, None).await.unwrap();
        assert!(featured.is_empty());
    }

    #[tokio::test]
    async fn test_set_featured_respects_revision() {
        let db = DBService::new_in_memory().await.unwrap();
        let item = ContentItem::upsert(
            &db.pool,
            &UpsertContentItem::new("a", "news", "Derby").featured(true),
        )
        .await
        .unwrap();

        let stale = ContentItem::set_featured(&db.pool, "a", false, Some("not-the-revision"))
            .await
            .unwrap();
        assert!(stale.is_none());

        let updated = ContentItem::set_featured(&db.pool, "a", false, Some(&item.revision))
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_featured);
        assert_ne!(updated.revision, item.revision);

        let missing = ContentItem::set_featured(&db.pool, "zzz", false, None).await.unwrap();
        assert!(missing.is_none());
    }
}
