use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_cache::app;
use catalog_cache::config::settings::AppConfig;
use catalog_cache::infrastructure::db::pool::{connect_to_db, run_migrations};
use catalog_cache::infrastructure::kv::KeyValueStore;
use catalog_cache::infrastructure::redis::client::RedisService;
use catalog_cache::modules::content::cache::ContentCache;
use catalog_cache::modules::content::repository::{ContentStore, PgContentStore};
use catalog_cache::modules::favorites::repository::PgFavoritesRemote;
use catalog_cache::modules::favorites::store::FavoritesStore;
use catalog_cache::modules::progress::repository::PgProgressRemote;
use catalog_cache::modules::progress::store::ProgressStore;
use catalog_cache::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("loading configuration")?;

    let db = connect_to_db(&config.database_url).await.context("connecting to PostgreSQL")?;
    run_migrations(&db).await.context("applying migrations")?;
    let redis = RedisService::new(&config.redis_url).await.context("connecting to Redis")?;
    let kv: Arc<dyn KeyValueStore> = Arc::new(redis);

    let store = PgContentStore::new(db.clone());
    store.listen().await.context("subscribing to content changes")?;
    let changes = store.subscribe();

    let content = Arc::new(ContentCache::new(Arc::new(store), config.cache_settings()));
    content.clone().watch_changes(changes);

    let progress = Arc::new(ProgressStore::new(
        Arc::new(PgProgressRemote::new(db.clone())),
        kv.clone(),
        config.login_policy,
    ));
    let favorites = Arc::new(FavoritesStore::new(Arc::new(PgFavoritesRemote::new(db)), kv.clone()));

    info!(policy = ?config.login_policy, ttl_ms = config.cache_ttl_ms, "Catalog cache configured");

    let port = config.server_port;
    let state = AppState::new(config, content, progress, favorites, kv);
    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("binding listener")?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
