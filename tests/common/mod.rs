#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

use catalog_cache::config::settings::AppConfig;
use catalog_cache::infrastructure::kv::{KeyValueStore, KvError};
use catalog_cache::modules::content::cache::{CacheSettings, ContentCache};
use catalog_cache::modules::content::model::{ContentType, RawDocument};
use catalog_cache::modules::content::repository::{ChangeEvent, ChangeOp, ContentStore, StoreError};
use catalog_cache::modules::favorites::model::FavoriteEntry;
use catalog_cache::modules::favorites::repository::{FavoritesError, FavoritesRemote};
use catalog_cache::modules::favorites::store::FavoritesStore;
use catalog_cache::modules::progress::model::{LoginPolicy, WatchProgress};
use catalog_cache::modules::progress::repository::{ProgressError, ProgressRemote};
use catalog_cache::modules::progress::store::ProgressStore;
use catalog_cache::state::AppState;

pub const JWT_SECRET: &str = "test-secret";

pub fn movie_doc(id: &str, title: &str) -> RawDocument {
    RawDocument::new(id, json!({ "id": id, "title": title, "type": "movie", "duration": 100 }))
}

pub fn series_doc(id: &str, title: &str, anime: bool) -> RawDocument {
    RawDocument::new(
        id,
        json!({
            "id": id,
            "title": title,
            "type": "series",
            "anime": anime,
            "seasons": [{
                "number": 1,
                "episodes": [
                    { "id": format!("{}-s1e1", id), "number": 1 },
                    { "id": format!("{}-s1e2", id), "number": 2 }
                ]
            }]
        }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Healthy,
    /// Never answers.
    Hang,
    Fail,
}

/// In-memory remote content store with call counters and injectable latency
/// and failures. Each call snapshots the documents when it starts, so a slow
/// call returns the data as it was at that moment.
pub struct MemoryContentStore {
    docs: Mutex<Vec<RawDocument>>,
    mode: Mutex<Mode>,
    delay: Mutex<Duration>,
    pub get_all_calls: AtomicUsize,
    pub get_by_id_calls: AtomicUsize,
    pub get_by_type_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryContentStore {
    pub fn new(docs: Vec<RawDocument>) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            docs: Mutex::new(docs),
            mode: Mutex::new(Mode::Healthy),
            delay: Mutex::new(Duration::ZERO),
            get_all_calls: AtomicUsize::new(0),
            get_by_id_calls: AtomicUsize::new(0),
            get_by_type_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            changes,
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_docs(&self, docs: Vec<RawDocument>) {
        *self.docs.lock().unwrap() = docs;
    }

    pub fn notify(&self, op: ChangeOp, id: &str) {
        let _ = self.changes.send(ChangeEvent { op, id: id.to_string() });
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<(), StoreError> {
        let mode = *self.mode.lock().unwrap();
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match mode {
            Mode::Healthy => Ok(()),
            Mode::Hang => std::future::pending().await,
            Mode::Fail => Err(StoreError::Unavailable("connection refused".to_string())),
        }
    }

    fn snapshot(&self) -> Vec<RawDocument> {
        self.docs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_all(&self) -> Result<Vec<RawDocument>, StoreError> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        let docs = self.snapshot();
        self.gate().await?;
        Ok(docs)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<RawDocument>, StoreError> {
        self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.snapshot().into_iter().find(|d| d.key == id);
        self.gate().await?;
        Ok(found)
    }

    async fn get_by_type(&self, content_type: ContentType) -> Result<Vec<RawDocument>, StoreError> {
        self.get_by_type_calls.fetch_add(1, Ordering::SeqCst);
        let docs: Vec<RawDocument> = self
            .snapshot()
            .into_iter()
            .filter(|d| d.value["type"] == content_type.as_str())
            .collect();
        self.gate().await?;
        Ok(docs)
    }

    async fn create(&self, mut doc: Value) -> Result<RawDocument, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let id = doc["id"]
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut docs = self.docs.lock().unwrap();
        if docs.iter().any(|d| d.key == id) {
            return Err(StoreError::Rejected("a record with this id already exists".to_string()));
        }
        doc["id"] = json!(id);
        doc["createdAt"] = json!(1);
        doc["updatedAt"] = json!(1);
        let raw = RawDocument::new(id, doc);
        docs.push(raw.clone());
        Ok(raw)
    }

    async fn update(&self, id: &str, patch: Value) -> Result<RawDocument, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .iter_mut()
            .find(|d| d.key == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let (Some(target), Some(fields)) = (doc.value.as_object_mut(), patch.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(doc.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let mut docs = self.docs.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| d.key != id);
        if docs.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

/// Local storage double.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, String>>,
    pub fail: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> Result<(), KvError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KvError::Unavailable("storage quota exceeded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.check()?;
        self.put(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryProgressRemote {
    records: Mutex<HashMap<(Uuid, String), WatchProgress>>,
    pub fail: AtomicBool,
}

impl MemoryProgressRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, user_id: Uuid, record: WatchProgress) {
        self.records
            .lock()
            .unwrap()
            .insert((user_id, record.content_id.clone()), record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }

    pub fn record(&self, user_id: Uuid, content_id: &str) -> Option<WatchProgress> {
        self.records
            .lock()
            .unwrap()
            .get(&(user_id, content_id.to_string()))
            .cloned()
    }

    fn check(&self) -> Result<(), ProgressError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProgressError::Remote("permission denied".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRemote for MemoryProgressRemote {
    async fn get(&self, user_id: Uuid, content_id: &str) -> Result<Option<WatchProgress>, ProgressError> {
        self.check()?;
        Ok(self.record(user_id, content_id))
    }

    async fn upsert(&self, user_id: Uuid, progress: &WatchProgress) -> Result<(), ProgressError> {
        self.check()?;
        self.insert(user_id, progress.clone());
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<WatchProgress>, ProgressError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryFavoritesRemote {
    entries: Mutex<HashMap<Uuid, Vec<FavoriteEntry>>>,
    pub fail: AtomicBool,
}

impl MemoryFavoritesRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn check(&self) -> Result<(), FavoritesError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProgressError::Remote("permission denied".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FavoritesRemote for MemoryFavoritesRemote {
    async fn list(&self, user_id: Uuid) -> Result<Vec<FavoriteEntry>, FavoritesError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().get(&user_id).cloned().unwrap_or_default())
    }

    async fn add(&self, user_id: Uuid, entry: &FavoriteEntry) -> Result<(), FavoritesError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let list = entries.entry(user_id).or_default();
        if !list.iter().any(|f| f.content_id == entry.content_id) {
            list.push(entry.clone());
        }
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, content_id: &str) -> Result<(), FavoritesError> {
        self.check()?;
        if let Some(list) = self.entries.lock().unwrap().get_mut(&user_id) {
            list.retain(|f| f.content_id != content_id);
        }
        Ok(())
    }
}

pub fn settings() -> CacheSettings {
    CacheSettings::default()
}

pub fn cache(store: &Arc<MemoryContentStore>) -> ContentCache {
    ContentCache::new(store.clone(), settings())
}

pub fn test_config(login_policy: LoginPolicy) -> AppConfig {
    AppConfig {
        server_port: 0,
        database_url: "postgres://unused".to_string(),
        redis_url: "redis://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        cache_ttl_ms: 30_000,
        catalog_timeout_ms: 10_000,
        type_timeout_ms: 10_000,
        point_timeout_ms: 8_000,
        write_timeout_ms: 10_000,
        login_policy,
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryContentStore>,
    pub kv: Arc<MemoryKv>,
    pub progress_remote: Arc<MemoryProgressRemote>,
    pub favorites_remote: Arc<MemoryFavoritesRemote>,
}

pub fn harness(docs: Vec<RawDocument>, login_policy: LoginPolicy) -> Harness {
    let config = test_config(login_policy);
    let store = MemoryContentStore::new(docs);
    let kv = MemoryKv::new();
    let progress_remote = MemoryProgressRemote::new();
    let favorites_remote = MemoryFavoritesRemote::new();

    let content = Arc::new(ContentCache::new(store.clone(), config.cache_settings()));
    let progress = Arc::new(ProgressStore::new(progress_remote.clone(), kv.clone(), login_policy));
    let favorites = Arc::new(FavoritesStore::new(favorites_remote.clone(), kv.clone()));
    let state = AppState::new(config, content, progress, favorites, kv.clone());

    Harness {
        state,
        store,
        kv,
        progress_remote,
        favorites_remote,
    }
}
