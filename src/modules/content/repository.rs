use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::postgres::PgListener;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::model::{ContentType, RawDocument};
use crate::common::clock::now_millis;
use crate::infrastructure::db::pool::DbPool;

pub const CHANGE_CHANNEL: &str = "content_changes";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("record '{0}' not found")]
    NotFound(String),
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Rejected("a record with this id already exists".to_string())
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some("42501") => {
                StoreError::PermissionDenied(db.message().to_string())
            }
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub id: String,
}

/// Remote document store holding the catalog.
///
/// Point reads return `None` when the document does not exist; every other
/// failure is a [`StoreError`]. Bodies are returned untyped and are decoded by
/// the caller.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<RawDocument>, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<RawDocument>, StoreError>;

    /// Server-side equality filter on the record type.
    async fn get_by_type(&self, content_type: ContentType) -> Result<Vec<RawDocument>, StoreError>;

    /// Stores a new document and returns it with server-assigned fields.
    async fn create(&self, doc: Value) -> Result<RawDocument, StoreError>;

    /// Merges `patch` into the stored document.
    async fn update(&self, id: &str, patch: Value) -> Result<RawDocument, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    doc: Value,
}

impl From<DocumentRow> for RawDocument {
    fn from(row: DocumentRow) -> Self {
        RawDocument::new(row.id, row.doc)
    }
}

#[derive(Clone)]
pub struct PgContentStore {
    pool: DbPool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl PgContentStore {
    pub fn new(pool: DbPool) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { pool, changes }
    }

    /// Forwards `NOTIFY content_changes` payloads to subscribers.
    pub async fn listen(&self) -> Result<JoinHandle<()>, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!("👂 Listening for content changes on '{}'", CHANGE_CHANNEL);

        let changes = self.changes.clone();
        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                            // No receivers is fine; nobody is caching yet.
                            Ok(event) => {
                                let _ = changes.send(event);
                            }
                            Err(e) => warn!("Ignoring malformed change payload: {}", e),
                        }
                    }
                    Err(e) => {
                        // PgListener reconnects on the next recv.
                        error!("Content change listener error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }))
    }
}

fn strip_server_fields(patch: &mut serde_json::Map<String, Value>) {
    for field in ["id", "type", "createdAt", "updatedAt"] {
        patch.remove(field);
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn get_all(&self) -> Result<Vec<RawDocument>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, doc FROM contents ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RawDocument::from).collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<RawDocument>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT id, doc FROM contents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RawDocument::from))
    }

    async fn get_by_type(&self, content_type: ContentType) -> Result<Vec<RawDocument>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, doc FROM contents WHERE content_type = $1 ORDER BY created_at DESC, id ASC",
        )
        .bind(content_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RawDocument::from).collect())
    }

    async fn create(&self, mut doc: Value) -> Result<RawDocument, StoreError> {
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| StoreError::Rejected("document must be an object".to_string()))?;

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let content_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Rejected("document has no type".to_string()))?
            .to_owned();
        let now = now_millis();

        obj.insert("id".to_string(), Value::String(id.clone()));
        obj.insert("createdAt".to_string(), Value::from(now));
        obj.insert("updatedAt".to_string(), Value::from(now));

        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO contents (id, content_type, doc, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, doc
            "#,
        )
        .bind(&id)
        .bind(&content_type)
        .bind(&doc)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, id: &str, mut patch: Value) -> Result<RawDocument, StoreError> {
        let obj = patch
            .as_object_mut()
            .ok_or_else(|| StoreError::Rejected("patch must be an object".to_string()))?;
        strip_server_fields(obj);
        let now = now_millis();

        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE contents
            SET
                doc = doc || $2::jsonb || jsonb_build_object('updatedAt', $3::bigint),
                updated_at = $3
            WHERE id = $1
            RETURNING id, doc
            "#,
        )
        .bind(id)
        .bind(&patch)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        Ok(row.into())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
