use async_trait::async_trait;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use super::model::WatchProgress;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::kv::KvError;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("remote progress store failed: {0}")]
    Remote(String),
    #[error(transparent)]
    Local(#[from] KvError),
}

impl From<sqlx::Error> for ProgressError {
    fn from(e: sqlx::Error) -> Self {
        ProgressError::Remote(e.to_string())
    }
}

/// Per-user progress held by the remote store, one record per content item.
#[async_trait]
pub trait ProgressRemote: Send + Sync {
    async fn get(&self, user_id: Uuid, content_id: &str) -> Result<Option<WatchProgress>, ProgressError>;

    /// Overwrites any existing record for the content item.
    async fn upsert(&self, user_id: Uuid, progress: &WatchProgress) -> Result<(), ProgressError>;

    async fn list(&self, user_id: Uuid) -> Result<Vec<WatchProgress>, ProgressError>;
}

#[derive(FromRow)]
struct ProgressRow {
    content_id: String,
    season_id: Option<String>,
    episode_id: Option<String>,
    progress: f64,
    completed: bool,
    last_watched_at: i64,
}

impl From<ProgressRow> for WatchProgress {
    fn from(row: ProgressRow) -> Self {
        WatchProgress {
            content_id: row.content_id,
            season_id: row.season_id,
            episode_id: row.episode_id,
            progress: row.progress,
            completed: row.completed,
            last_watched_at: row.last_watched_at,
        }
    }
}

#[derive(Clone)]
pub struct PgProgressRemote {
    pool: DbPool,
}

impl PgProgressRemote {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRemote for PgProgressRemote {
    async fn get(&self, user_id: Uuid, content_id: &str) -> Result<Option<WatchProgress>, ProgressError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT content_id, season_id, episode_id, progress, completed, last_watched_at
            FROM watch_progress
            WHERE user_id = $1 AND content_id = $2
            "#,
        )
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(WatchProgress::from))
    }

    async fn upsert(&self, user_id: Uuid, progress: &WatchProgress) -> Result<(), ProgressError> {
        sqlx::query(
            r#"
            INSERT INTO watch_progress
                (user_id, content_id, season_id, episode_id, progress, completed, last_watched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, content_id) DO UPDATE SET
                season_id = EXCLUDED.season_id,
                episode_id = EXCLUDED.episode_id,
                progress = EXCLUDED.progress,
                completed = EXCLUDED.completed,
                last_watched_at = EXCLUDED.last_watched_at
            "#,
        )
        .bind(user_id)
        .bind(&progress.content_id)
        .bind(&progress.season_id)
        .bind(&progress.episode_id)
        .bind(progress.progress)
        .bind(progress.completed)
        .bind(progress.last_watched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<WatchProgress>, ProgressError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT content_id, season_id, episode_id, progress, completed, last_watched_at
            FROM watch_progress
            WHERE user_id = $1
            ORDER BY last_watched_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WatchProgress::from).collect())
    }
}
