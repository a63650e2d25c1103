use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// One persisted image reference attached to a listing, brand or option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StoredImage {
    pub id: Uuid,
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub url: Option<String>,
    pub key: Option<String>,
    pub sort_order: i32,
    pub is_main: bool,
    /// Human readable text (e.g. make and model) used for placeholder images
    pub label: Option<String>,
}

/// Read/write access to image records needed by the repair sweep
#[async_trait]
pub trait ImageRecordStore: Send + Sync {
    /// Next page of records ordered by id, strictly after `after`.
    async fn fetch_batch(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<StoredImage>>;

    async fn update_url(&self, id: Uuid, url: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct ImageRecordRepository {
    pool: PgPool,
}

impl ImageRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRecordStore for ImageRecordRepository {
    #[tracing::instrument(skip(self), fields(db.table = "listing_images", db.operation = "select"))]
    async fn fetch_batch(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<StoredImage>> {
        let rows = sqlx::query_as::<Postgres, StoredImage>(
            r#"
            SELECT id, owner_kind, owner_id, url, key, sort_order, is_main, label
            FROM listing_images
            WHERE ($1::uuid IS NULL OR id > $1)
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch image records")?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self, url), fields(db.table = "listing_images", db.operation = "update", db.record_id = %id))]
    async fn update_url(&self, id: Uuid, url: &str) -> Result<()> {
        let result = sqlx::query("UPDATE listing_images SET url = $1 WHERE id = $2")
            .bind(url)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update image url")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Image record {} not found", id));
        }

        Ok(())
    }
}
