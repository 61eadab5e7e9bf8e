// SPDX-License-Identifier: GPL-3.0-or-later

//! SQLite persistence for the reference hash catalog.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use vidsort_application::phash::{hamming_similarity, HashMatch, HashStore};
use vidsort_domain::CatalogId;

/// One stored frame hash of a known title.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceHash {
    pub catalog_id: CatalogId,
    pub title: String,
    pub year: Option<u16>,
    pub frame_index: u32,
    pub hash: u64,
}

#[async_trait::async_trait]
pub trait ReferenceHashRepository: Send + Sync {
    async fn insert(&self, entry: &ReferenceHash) -> Result<()>;
    async fn all(&self) -> Result<Vec<ReferenceHash>>;
    async fn count(&self) -> Result<u64>;
    async fn delete_title(&self, catalog_id: CatalogId) -> Result<u64>;
}

/// SQLx-backed reference hash repository
pub struct SqliteReferenceRepository {
    pool: SqlitePool,
}

impl SqliteReferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReferenceHashRepository for SqliteReferenceRepository {
    async fn insert(&self, entry: &ReferenceHash) -> Result<()> {
        debug!(
            target: "repository",
            catalog_id = %entry.catalog_id,
            frame_index = entry.frame_index,
            "storing reference hash"
        );
        let q = r#"
            INSERT INTO reference_hashes (
                catalog_id, title, year, frame_index, hash, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
        "#;

        // SQLite has no unsigned 64-bit type; the hash round-trips through i64
        sqlx::query(q)
            .bind(entry.catalog_id.0 as i64)
            .bind(entry.title.clone())
            .bind(entry.year.map(|y| y as i64))
            .bind(entry.frame_index as i64)
            .bind(entry.hash as i64)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ReferenceHash>> {
        let rows = sqlx::query(
            "SELECT catalog_id, title, year, frame_index, hash FROM reference_hashes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(ReferenceHash {
                catalog_id: CatalogId(r.get::<i64, _>("catalog_id") as u64),
                title: r.get("title"),
                year: r.get::<Option<i64>, _>("year").map(|y| y as u16),
                frame_index: r.get::<i64, _>("frame_index") as u32,
                hash: r.get::<i64, _>("hash") as u64,
            });
        }
        Ok(out)
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM reference_hashes")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn delete_title(&self, catalog_id: CatalogId) -> Result<u64> {
        debug!(target: "repository", %catalog_id, "deleting reference hashes");
        let result = sqlx::query("DELETE FROM reference_hashes WHERE catalog_id = ?")
            .bind(catalog_id.0 as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Hash lookup over an in-memory snapshot of the reference table.
///
/// The whole catalog is loaded once at construction; hamming distance is
/// computed in Rust since SQLite cannot.
pub struct SqliteHashStore {
    entries: Vec<ReferenceHash>,
}

impl SqliteHashStore {
    pub async fn load(pool: SqlitePool) -> Result<Self> {
        let entries = SqliteReferenceRepository::new(pool).all().await?;
        debug!(
            target: "repository",
            "loaded {} reference hashes",
            entries.len()
        );
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl HashStore for SqliteHashStore {
    async fn nearest(&self, hash: u64) -> Result<Option<HashMatch>> {
        let mut best: Option<HashMatch> = None;
        for entry in &self.entries {
            let score = hamming_similarity(hash, entry.hash);
            let replace = best.as_ref().map(|b| score > b.score).unwrap_or(true);
            if replace {
                best = Some(HashMatch {
                    catalog_id: entry.catalog_id,
                    title: entry.title.clone(),
                    year: entry.year,
                    score,
                });
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite://:memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
        pool
    }

    fn entry(catalog_id: u64, title: &str, hash: u64) -> ReferenceHash {
        ReferenceHash {
            catalog_id: CatalogId(catalog_id),
            title: title.to_string(),
            year: Some(2010),
            frame_index: 0,
            hash,
        }
    }

    #[tokio::test]
    async fn insert_and_read_back_round_trips_the_hash() {
        let pool = test_pool().await;
        let repo = SqliteReferenceRepository::new(pool);

        // high bit set exercises the i64 round trip
        let stored = entry(27205, "Inception", 0x8000_0000_0000_00ff);
        repo.insert(&stored).await.unwrap();

        let all = repo.all().await.unwrap();
        assert_eq!(all, vec![stored]);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_title_removes_only_that_catalog_id() {
        let pool = test_pool().await;
        let repo = SqliteReferenceRepository::new(pool);
        repo.insert(&entry(1, "A", 1)).await.unwrap();
        repo.insert(&entry(1, "A", 2)).await.unwrap();
        repo.insert(&entry(2, "B", 3)).await.unwrap();

        assert_eq!(repo.delete_title(CatalogId(1)).await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn nearest_prefers_the_closest_hash() {
        let pool = test_pool().await;
        let repo = SqliteReferenceRepository::new(pool.clone());
        repo.insert(&entry(1, "Exact", 0b1010)).await.unwrap();
        repo.insert(&entry(2, "OneOff", 0b1011)).await.unwrap();

        let store = SqliteHashStore::load(pool).await.unwrap();
        let hit = store.nearest(0b1010).await.unwrap().unwrap();
        assert_eq!(hit.title, "Exact");
        assert!((hit.score - 1.0).abs() < 1e-6);

        let hit = store.nearest(0b1011).await.unwrap().unwrap();
        assert_eq!(hit.title, "OneOff");
    }

    #[tokio::test]
    async fn empty_store_returns_no_match() {
        let pool = test_pool().await;
        let store = SqliteHashStore::load(pool).await.unwrap();
        assert!(store.is_empty());
        assert!(store.nearest(42).await.unwrap().is_none());
    }
}
