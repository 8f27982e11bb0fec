use std::sync::Arc;

use tracing::warn;

use super::model::FavoriteEntry;
use super::repository::{FavoritesError, FavoritesRemote};
use crate::common::clock::now_millis;
use crate::infrastructure::kv::{KeyValueStore, device_key};
use crate::modules::auth::model::Viewer;

const LOCAL_KEY: &str = "favorites";

/// Favorite content per viewer. Routed like watch progress: remote when
/// signed in, a JSON array in local storage otherwise.
pub struct FavoritesStore {
    remote: Arc<dyn FavoritesRemote>,
    local: Arc<dyn KeyValueStore>,
}

impl FavoritesStore {
    pub fn new(remote: Arc<dyn FavoritesRemote>, local: Arc<dyn KeyValueStore>) -> Self {
        Self { remote, local }
    }

    /// Newest first. Empty on failure.
    pub async fn list(&self, viewer: &Viewer) -> Vec<FavoriteEntry> {
        let listed = match viewer {
            Viewer::Authenticated { user_id, .. } => self.remote.list(*user_id).await,
            Viewer::Anonymous { device_id } => self.read_local(device_id).await,
        };

        match listed {
            Ok(mut entries) => {
                entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
                entries
            }
            Err(e) => {
                warn!(error = %e, "Failed to list favorites");
                Vec::new()
            }
        }
    }

    pub async fn contains(&self, viewer: &Viewer, content_id: &str) -> bool {
        self.list(viewer).await.iter().any(|f| f.content_id == content_id)
    }

    /// Returns whether the change was stored.
    pub async fn add(&self, viewer: &Viewer, content_id: &str) -> bool {
        let entry = FavoriteEntry {
            content_id: content_id.to_string(),
            added_at: now_millis(),
        };

        let result = match viewer {
            Viewer::Authenticated { user_id, .. } => self.remote.add(*user_id, &entry).await,
            Viewer::Anonymous { device_id } => self.update_local(device_id, |entries| {
                if !entries.iter().any(|f| f.content_id == entry.content_id) {
                    entries.push(entry.clone());
                }
            })
            .await,
        };

        self.settle(result, content_id, "add")
    }

    pub async fn remove(&self, viewer: &Viewer, content_id: &str) -> bool {
        let result = match viewer {
            Viewer::Authenticated { user_id, .. } => self.remote.remove(*user_id, content_id).await,
            Viewer::Anonymous { device_id } => {
                self.update_local(device_id, |entries| entries.retain(|f| f.content_id != content_id))
                    .await
            }
        };

        self.settle(result, content_id, "remove")
    }

    fn settle(&self, result: Result<(), FavoritesError>, content_id: &str, action: &str) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(content_id, action, error = %e, "Dropped favorites update");
                false
            }
        }
    }

    async fn read_local(&self, device_id: &str) -> Result<Vec<FavoriteEntry>, FavoritesError> {
        match self.local.get(&device_key(device_id, LOCAL_KEY)).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| FavoritesError::Local(e.into())),
            None => Ok(Vec::new()),
        }
    }

    async fn update_local<F>(&self, device_id: &str, change: F) -> Result<(), FavoritesError>
    where
        F: FnOnce(&mut Vec<FavoriteEntry>),
    {
        let mut entries = self.read_local(device_id).await?;
        change(&mut entries);
        let raw = serde_json::to_string(&entries).map_err(|e| FavoritesError::Local(e.into()))?;
        self.local.set(&device_key(device_id, LOCAL_KEY), &raw).await?;
        Ok(())
    }
}
