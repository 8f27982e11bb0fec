use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::model::FavoriteEntry;
use crate::infrastructure::db::pool::DbPool;
use crate::modules::progress::repository::ProgressError;

/// Favorites share the progress error type; both are best-effort viewer data.
pub type FavoritesError = ProgressError;

#[async_trait]
pub trait FavoritesRemote: Send + Sync {
    async fn list(&self, user_id: Uuid) -> Result<Vec<FavoriteEntry>, FavoritesError>;

    /// No-op when the item is already a favorite.
    async fn add(&self, user_id: Uuid, entry: &FavoriteEntry) -> Result<(), FavoritesError>;

    async fn remove(&self, user_id: Uuid, content_id: &str) -> Result<(), FavoritesError>;
}

#[derive(FromRow)]
struct FavoriteRow {
    content_id: String,
    added_at: i64,
}

#[derive(Clone)]
pub struct PgFavoritesRemote {
    pool: DbPool,
}

impl PgFavoritesRemote {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoritesRemote for PgFavoritesRemote {
    async fn list(&self, user_id: Uuid) -> Result<Vec<FavoriteEntry>, FavoritesError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            "SELECT content_id, added_at FROM favorites WHERE user_id = $1 ORDER BY added_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| FavoriteEntry {
                content_id: r.content_id,
                added_at: r.added_at,
            })
            .collect())
    }

    async fn add(&self, user_id: Uuid, entry: &FavoriteEntry) -> Result<(), FavoritesError> {
        sqlx::query(
            "INSERT INTO favorites (user_id, content_id, added_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(&entry.content_id)
        .bind(entry.added_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, content_id: &str) -> Result<(), FavoritesError> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND content_id = $2")
            .bind(user_id)
            .bind(content_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
