use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::kv::KeyValueStore;
use crate::modules::content::cache::ContentCache;
use crate::modules::favorites::store::FavoritesStore;
use crate::modules::progress::store::ProgressStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub content: Arc<ContentCache>,
    pub progress: Arc<ProgressStore>,
    pub favorites: Arc<FavoritesStore>,
    pub kv: Arc<dyn KeyValueStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        content: Arc<ContentCache>,
        progress: Arc<ProgressStore>,
        favorites: Arc<FavoritesStore>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            content,
            progress,
            favorites,
            kv,
        }
    }
}
