use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

const MIGRATION_001_IMAGES: &str = include_str!("../migrations/001_images.sql");

/// Upper bound on rows returned by a listing.
pub const LIST_LIMIT: i64 = 1000;

/// One stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub filename: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Image records backed by a SQLite pool.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    pool: SqlitePool,
}

impl ImageRepository {
    /// Connect and run migrations.
    ///
    /// In-memory databases get a single long-lived connection so every
    /// request sees the same data.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RepositoryError::Connect { source: e })?
            .create_if_missing(true);

        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| RepositoryError::Connect { source: e })?;

        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        tracing::debug!("running migration 001: images");
        sqlx::query(MIGRATION_001_IMAGES)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Migrate { source: e })?;
        Ok(())
    }

    pub async fn insert(&self, filename: &str, category: &str) -> Result<Image, RepositoryError> {
        sqlx::query_as::<_, Image>(
            "INSERT INTO images (filename, category, created_at) VALUES (?, ?, ?) \
             RETURNING id, filename, category, created_at",
        )
        .bind(filename)
        .bind(category)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    /// At most `limit` images, oldest first.
    pub async fn list(&self, limit: i64) -> Result<Vec<Image>, RepositoryError> {
        sqlx::query_as::<_, Image>(
            "SELECT id, filename, category, created_at FROM images ORDER BY id LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    pub async fn find(&self, filename: &str) -> Result<Option<Image>, RepositoryError> {
        sqlx::query_as::<_, Image>(
            "SELECT id, filename, category, created_at FROM images WHERE filename = ?",
        )
        .bind(filename)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn count_category(&self, category: &str) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images WHERE category = ?")
            .bind(category)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_category(&self, category: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM images WHERE category = ?")
            .bind(category)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM images")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("failed to connect to the database")]
    Connect { source: sqlx::Error },
    #[error("database migration failed")]
    Migrate { source: sqlx::Error },
    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),
}

/// `sqlite::memory:` or any URL opened with `mode=memory`.
fn is_in_memory(database_url: &str) -> bool {
    let (path, query) = database_url
        .split_once('?')
        .unwrap_or((database_url, ""));
    path.ends_with(":memory:") || query.split('&').any(|pair| pair == "mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> ImageRepository {
        ImageRepository::connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn in_memory_url_forms() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite:file:memtest?mode=memory"));
        assert!(is_in_memory("sqlite://memtest?cache=shared&mode=memory"));
        assert!(!is_in_memory("sqlite://imgstore.db?mode=rwc"));
        assert!(!is_in_memory("sqlite://memory.db"));
    }

    #[tokio::test]
    async fn memory_mode_url_shares_one_connection() {
        let repo = ImageRepository::connect("sqlite:file:imgstore-memtest?mode=memory")
            .await
            .unwrap();
        assert_eq!(repo.pool.options().get_max_connections(), 1);

        repo.insert("a.png", "cats").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_database_gets_a_pool() {
        let tmp = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}", tmp.path().join("images.db").display());
        let repo = ImageRepository::connect(&url).await.unwrap();
        assert_eq!(repo.pool.options().get_max_connections(), 10);
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_timestamps() {
        let repo = repo().await;
        let before = Utc::now();

        let a = repo.insert("a.png", "cats").await.unwrap();
        let b = repo.insert("b.png", "dogs").await.unwrap();

        assert!(b.id > a.id);
        assert_eq!(a.category, "cats");
        assert!(a.created_at >= before - chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn filenames_are_unique() {
        let repo = repo().await;
        repo.insert("a.png", "cats").await.unwrap();

        let err = repo.insert("a.png", "dogs").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
    }

    #[tokio::test]
    async fn find_and_list() {
        let repo = repo().await;
        repo.insert("a.png", "cats").await.unwrap();
        repo.insert("b.png", "cats").await.unwrap();

        assert_eq!(repo.find("b.png").await.unwrap().unwrap().filename, "b.png");
        assert!(repo.find("zzz.png").await.unwrap().is_none());

        let all = repo.list(LIST_LIMIT).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].filename, "a.png");
        assert_eq!(repo.list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deletes_report_affected_rows() {
        let repo = repo().await;
        let a = repo.insert("a.png", "cats").await.unwrap();
        repo.insert("b.png", "cats").await.unwrap();
        repo.insert("c.png", "dogs").await.unwrap();

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());
        assert_eq!(repo.count_category("cats").await.unwrap(), 1);
        assert_eq!(repo.delete_category("cats").await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.delete_all().await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
