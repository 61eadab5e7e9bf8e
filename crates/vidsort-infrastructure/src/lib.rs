// SPDX-License-Identifier: GPL-3.0-or-later
pub mod builder;
pub mod reference;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use vidsort_config::AppConfig;

pub use builder::{BuilderControl, BuilderStatistics, ReferenceBuilder};
pub use reference::{ReferenceHash, ReferenceHashRepository, SqliteHashStore, SqliteReferenceRepository};

pub async fn init_database(config: &AppConfig) -> Result<SqlitePool> {
    info!(target: "infrastructure", "initializing reference database");

    // Normalize the database URL for SQLite on Windows
    let db_url = if config.database.url.starts_with("sqlite://")
        && !config.database.url.starts_with("sqlite://:memory:")
    {
        let db_path = config.database.url.trim_start_matches("sqlite://");
        let path = Path::new(db_path);

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
                info!(target: "infrastructure", path = %parent.display(), "created database directory");
            }
        }

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        // Forward slashes work for SQLite on all platforms
        let path_str = absolute_path.to_string_lossy().replace('\\', "/");

        // Add create mode to ensure SQLite can create the file
        format!("sqlite://{}?mode=rwc", path_str)
    } else {
        config.database.url.clone()
    };

    info!(target: "infrastructure", db_url = %db_url, "connecting to database");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.pool_max_size)
        .connect(&db_url)
        .await?;

    info!(target: "infrastructure", "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "infrastructure", "reference database ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relative_database_path_is_created_under_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut config = AppConfig::default();
        config.database.url = "sqlite://data/vidsort.db".to_string();
        let pool = init_database(&config).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reference_hashes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
        assert!(dir.path().join("data/vidsort.db").exists());
    }

    #[tokio::test]
    async fn in_memory_database_initializes() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite://:memory:".to_string();
        let pool = init_database(&config).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reference_hashes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
