//! Read-through cache over the remote content store.
//!
//! Records are indexed by id and by type. Reads are served from memory while
//! the last full fetch is younger than the TTL; otherwise a single remote
//! fetch per key is started and raced against a deadline. When the remote
//! store fails or is too slow, reads fall back to whatever is cached and then
//! to the built-in seed catalog, so callers always receive data.
//!
//! Fetches run as spawned tasks and outlive a caller that stopped waiting.
//! Every fetch carries a sequence number, and its result is applied only if
//! no newer fetch for the same key was issued and the cache was not
//! invalidated in the meantime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::model::{ContentPatch, ContentRecord, ContentType, NewContent, RawDocument, check_shape};
use super::repository::{ChangeEvent, ContentStore, StoreError};
use super::seed;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub catalog_timeout: Duration,
    pub type_timeout: Duration,
    pub point_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            catalog_timeout: Duration::from_secs(10),
            type_timeout: Duration::from_secs(10),
            point_timeout: Duration::from_secs(8),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Where the value of a read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Served from memory without contacting the remote store.
    Cache,
    /// Fetched from the remote store by this read.
    Remote,
    /// Cached data served because the remote read failed.
    Stale,
    /// Built-in seed data served because the remote read failed and nothing
    /// was cached.
    Seed,
    /// The remote read failed and no fallback exists.
    None,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchFailure {
    #[error("remote read timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("remote returned a malformed record: {0}")]
    Malformed(String),
    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

/// A read result. `failure` is set whenever the value is a fallback, so the
/// caller can offer a retry.
#[derive(Debug, Clone)]
pub struct Served<T> {
    pub value: T,
    pub origin: Origin,
    pub failure: Option<FetchFailure>,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Cache => "cache",
            Origin::Remote => "remote",
            Origin::Stale => "stale",
            Origin::Seed => "seed",
            Origin::None => "none",
        }
    }
}

impl<T> Served<T> {
    fn ok(value: T, origin: Origin) -> Self {
        Self { value, origin, failure: None }
    }

    fn degraded(value: T, origin: Origin, failure: FetchFailure) -> Self {
        Self { value, origin, failure: Some(failure) }
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Errors surfaced by the write path.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content '{0}' not found")]
    NotFound(String),
    #[error("invalid content: {0}")]
    Invalid(String),
    #[error("content '{id}' is unavailable: {reason}")]
    Unavailable { id: String, reason: FetchFailure },
    #[error("remote write timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Remote(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStats {
    pub records: usize,
    pub movies: usize,
    pub series: usize,
    pub initial_fetch_done: bool,
    pub last_fetch_age_ms: Option<u64>,
    pub fetches_in_flight: usize,
    pub remote_reads: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FetchKey {
    Catalog,
    Type(ContentType),
}

type FetchResult = Result<Arc<Vec<ContentRecord>>, FetchFailure>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    seq: u64,
    fetch: SharedFetch,
}

enum Loaded {
    Cached(Vec<ContentRecord>),
    Remote(Vec<ContentRecord>),
    Failed(FetchFailure),
}

#[derive(Default)]
struct CacheState {
    by_id: HashMap<String, ContentRecord>,
    by_type: HashMap<ContentType, Vec<String>>,
    order: Vec<String>,
    last_fetch: Option<Instant>,
    type_fetched: HashMap<ContentType, Instant>,
    initial_fetch_done: bool,
    in_flight: HashMap<FetchKey, InFlight>,
    // sequence bookkeeping
    next_seq: u64,
    epoch: u64,
    issued: HashMap<FetchKey, u64>,
    point_issued: HashMap<String, u64>,
    type_seq: HashMap<ContentType, u64>,
    // counters
    remote_reads: u64,
    cache_hits: u64,
    fallbacks: u64,
}

impl CacheState {
    fn catalog_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.initial_fetch_done
            && self
                .last_fetch
                .is_some_and(|at| now.saturating_duration_since(at) < ttl)
    }

    fn type_fresh(&self, content_type: ContentType, now: Instant, ttl: Duration) -> bool {
        self.catalog_fresh(now, ttl)
            || (self.initial_fetch_done
                && self
                    .type_fetched
                    .get(&content_type)
                    .is_some_and(|at| now.saturating_duration_since(*at) < ttl))
    }

    fn is_fresh(&self, key: FetchKey, now: Instant, ttl: Duration) -> bool {
        match key {
            FetchKey::Catalog => self.catalog_fresh(now, ttl),
            FetchKey::Type(t) => self.type_fresh(t, now, ttl),
        }
    }

    fn all_records(&self) -> Vec<ContentRecord> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .cloned()
            .collect()
    }

    fn records_of_type(&self, content_type: ContentType) -> Vec<ContentRecord> {
        self.by_type
            .get(&content_type)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    fn records_for(&self, key: FetchKey) -> Vec<ContentRecord> {
        match key {
            FetchKey::Catalog => self.all_records(),
            FetchKey::Type(t) => self.records_of_type(t),
        }
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn reindex(&mut self) {
        let mut by_type: HashMap<ContentType, Vec<String>> =
            ContentType::ALL.iter().map(|t| (*t, Vec::new())).collect();
        for id in &self.order {
            if let Some(record) = self.by_id.get(id) {
                by_type.entry(record.content_type).or_default().push(id.clone());
            }
        }
        self.by_type = by_type;
    }

    fn remove_type(&mut self, content_type: ContentType) {
        let by_id = &mut self.by_id;
        self.order.retain(|id| match by_id.get(id) {
            Some(record) if record.content_type == content_type => {
                by_id.remove(id);
                false
            }
            _ => true,
        });
    }

    fn push_records(&mut self, records: impl IntoIterator<Item = ContentRecord>) {
        for record in records {
            if self.by_id.insert(record.id.clone(), record.clone()).is_none() {
                self.order.push(record.id);
            }
        }
    }

    fn apply_catalog(&mut self, records: &[ContentRecord], seq: u64, now: Instant) {
        // Types refreshed by a newer type query keep their newer records.
        let newer: Vec<ContentType> = ContentType::ALL
            .into_iter()
            .filter(|t| self.type_seq.get(t).is_some_and(|s| *s > seq))
            .collect();
        let kept: Vec<ContentRecord> = newer.iter().flat_map(|t| self.records_of_type(*t)).collect();

        self.by_id.clear();
        self.order.clear();
        self.push_records(
            records
                .iter()
                .filter(|r| !newer.contains(&r.content_type))
                .cloned(),
        );
        self.push_records(kept);
        self.reindex();

        for t in ContentType::ALL {
            if !newer.contains(&t) {
                self.type_seq.insert(t, seq);
            }
        }
        self.last_fetch = Some(now);
        self.initial_fetch_done = true;
    }

    fn apply_type(&mut self, content_type: ContentType, records: &[ContentRecord], seq: u64, now: Instant) {
        if self.type_seq.get(&content_type).is_some_and(|s| *s > seq) {
            return;
        }
        self.remove_type(content_type);
        self.push_records(records.iter().filter(|r| r.content_type == content_type).cloned());
        self.reindex();
        self.type_seq.insert(content_type, seq);
        self.type_fetched.insert(content_type, now);
    }

    /// Applies a finished fetch. Returns whether the result was applied.
    fn finish(&mut self, key: FetchKey, seq: u64, epoch: u64, records: &[ContentRecord]) -> bool {
        self.clear_flight(key, seq);

        if self.epoch != epoch || self.issued.get(&key) != Some(&seq) {
            debug!(?key, seq, "discarding superseded fetch result");
            return false;
        }

        let now = Instant::now();
        match key {
            FetchKey::Catalog => self.apply_catalog(records, seq, now),
            FetchKey::Type(t) => self.apply_type(t, records, seq, now),
        }
        true
    }

    fn clear_flight(&mut self, key: FetchKey, seq: u64) {
        if self.in_flight.get(&key).is_some_and(|f| f.seq == seq) {
            self.in_flight.remove(&key);
        }
    }

    fn apply_point(&mut self, id: &str, seq: u64, epoch: u64, record: Option<&ContentRecord>) {
        if self.epoch != epoch || self.point_issued.get(id) != Some(&seq) {
            return;
        }
        self.point_issued.remove(id);

        let cached_type = record
            .map(|r| r.content_type)
            .or_else(|| self.by_id.get(id).map(|r| r.content_type));
        if let Some(t) = cached_type {
            if self.type_seq.get(&t).is_some_and(|s| *s > seq) {
                return;
            }
        }

        match record {
            Some(record) => {
                self.push_records([record.clone()]);
            }
            None => {
                self.by_id.remove(id);
                self.order.retain(|cached| cached != id);
            }
        }
        self.reindex();
    }

    fn invalidate(&mut self) {
        self.epoch += 1;
        self.last_fetch = None;
        self.initial_fetch_done = false;
        self.type_fetched.clear();
        self.in_flight.clear();
    }
}

fn decode_all(docs: Vec<RawDocument>) -> Vec<ContentRecord> {
    docs.into_iter()
        .filter_map(|raw| {
            let key = raw.key.clone();
            match ContentRecord::decode(raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(%key, "Skipping malformed content record: {}", e);
                    None
                }
            }
        })
        .collect()
}

pub struct ContentCache {
    store: Arc<dyn ContentStore>,
    settings: CacheSettings,
    state: Arc<Mutex<CacheState>>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn ContentStore>, settings: CacheSettings) -> Self {
        Self {
            store,
            settings,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub async fn get_all(&self) -> Served<Vec<ContentRecord>> {
        match self.load(FetchKey::Catalog).await {
            Loaded::Cached(records) => Served::ok(records, Origin::Cache),
            Loaded::Remote(records) => Served::ok(records, Origin::Remote),
            Loaded::Failed(failure) => {
                let mut state = self.state.lock().await;
                state.fallbacks += 1;
                let cached = state.all_records();
                if cached.is_empty() {
                    Served::degraded(seed::seed_catalog(), Origin::Seed, failure)
                } else {
                    Served::degraded(cached, Origin::Stale, failure)
                }
            }
        }
    }

    pub async fn get_by_type(&self, content_type: ContentType) -> Served<Vec<ContentRecord>> {
        let key = {
            let mut state = self.state.lock().await;
            if state.type_fresh(content_type, Instant::now(), self.settings.ttl) {
                state.cache_hits += 1;
                return Served::ok(state.records_of_type(content_type), Origin::Cache);
            }
            if state.initial_fetch_done {
                FetchKey::Type(content_type)
            } else {
                FetchKey::Catalog
            }
        };

        let only_type = |records: Vec<ContentRecord>| -> Vec<ContentRecord> {
            records
                .into_iter()
                .filter(|r| r.content_type == content_type)
                .collect()
        };

        match self.load(key).await {
            Loaded::Cached(records) => Served::ok(only_type(records), Origin::Cache),
            Loaded::Remote(records) => Served::ok(only_type(records), Origin::Remote),
            Loaded::Failed(failure) => {
                let mut state = self.state.lock().await;
                state.fallbacks += 1;
                let cached = state.records_of_type(content_type);
                if cached.is_empty() {
                    Served::degraded(seed::seed_by_type(content_type), Origin::Seed, failure)
                } else {
                    Served::degraded(cached, Origin::Stale, failure)
                }
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Served<Option<ContentRecord>> {
        let (seq, epoch) = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let servable = state.by_id.get(id).is_some_and(|record| {
                state.type_fresh(record.content_type, now, self.settings.ttl)
                    || state.in_flight.contains_key(&FetchKey::Catalog)
            });
            if servable {
                state.cache_hits += 1;
                return Served::ok(state.by_id.get(id).cloned(), Origin::Cache);
            }

            let seq = state.issue_seq();
            state.point_issued.insert(id.to_string(), seq);
            state.remote_reads += 1;
            (seq, state.epoch)
        };

        let deadline = self.settings.point_timeout;
        let failure = match timeout(deadline, self.store.get_by_id(id)).await {
            Ok(Ok(Some(raw))) => match ContentRecord::decode(raw) {
                Ok(record) => {
                    self.state.lock().await.apply_point(id, seq, epoch, Some(&record));
                    return Served::ok(Some(record), Origin::Remote);
                }
                Err(e) => FetchFailure::Malformed(e.to_string()),
            },
            Ok(Ok(None)) => {
                self.state.lock().await.apply_point(id, seq, epoch, None);
                return Served::ok(None, Origin::Remote);
            }
            Ok(Err(e)) => FetchFailure::Store(e),
            Err(_) => FetchFailure::Timeout(deadline),
        };

        warn!(%id, "Point read failed, falling back: {}", failure);
        let mut state = self.state.lock().await;
        state.fallbacks += 1;
        if let Some(record) = state.by_id.get(id).cloned() {
            return Served::degraded(Some(record), Origin::Stale, failure);
        }
        match seed::seed_by_id(id) {
            Some(record) => Served::degraded(Some(record), Origin::Seed, failure),
            None => Served::degraded(None, Origin::None, failure),
        }
    }

    /// Forces the next read to refetch. Cached records stay available as
    /// fallback data.
    pub async fn invalidate(&self) {
        self.state.lock().await.invalidate();
        debug!("Content cache invalidated");
    }

    pub async fn create(&self, new: NewContent) -> Result<ContentRecord, ContentError> {
        let probe_id = new.id.clone().unwrap_or_default();
        check_shape(&probe_id, new.content_type, new.anime, &new.seasons)
            .map_err(|e| ContentError::Invalid(e.to_string()))?;
        let doc = serde_json::to_value(&new).map_err(|e| ContentError::Invalid(e.to_string()))?;

        let raw = self.write(self.store.create(doc)).await?;
        self.invalidate().await;
        info!(id = %raw.key, "Content created");

        ContentRecord::decode(raw).map_err(|e| ContentError::Invalid(e.to_string()))
    }

    pub async fn update(&self, id: &str, patch: ContentPatch) -> Result<ContentRecord, ContentError> {
        if patch.is_empty() {
            return Err(ContentError::Invalid("patch has no fields".to_string()));
        }
        patch.check(id).map_err(|e| ContentError::Invalid(e.to_string()))?;
        let doc = serde_json::to_value(&patch).map_err(|e| ContentError::Invalid(e.to_string()))?;

        let raw = self.write(self.store.update(id, doc)).await?;
        self.invalidate().await;
        info!(%id, "Content updated");

        ContentRecord::decode(raw).map_err(|e| ContentError::Invalid(e.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ContentError> {
        self.write(self.store.delete(id)).await?;
        self.invalidate().await;
        info!(%id, "Content deleted");
        Ok(())
    }

    /// Invalidates on every change reported by the remote store.
    pub fn watch_changes(self: Arc<Self>, mut changes: broadcast::Receiver<ChangeEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        debug!(?event, "Remote content changed");
                        self.invalidate().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Change feed lagged, invalidating");
                        self.invalidate().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let count = |t| state.by_type.get(&t).map_or(0, Vec::len);
        CacheStats {
            records: state.order.len(),
            movies: count(ContentType::Movie),
            series: count(ContentType::Series),
            initial_fetch_done: state.initial_fetch_done,
            last_fetch_age_ms: state
                .last_fetch
                .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64),
            fetches_in_flight: state.in_flight.len(),
            remote_reads: state.remote_reads,
            cache_hits: state.cache_hits,
            fallbacks: state.fallbacks,
        }
    }

    async fn write<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ContentError> {
        let deadline = self.settings.write_timeout;
        match timeout(deadline, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::NotFound(id))) => Err(ContentError::NotFound(id)),
            Ok(Err(e)) => {
                warn!("Remote write failed: {}", e);
                Err(ContentError::Remote(e))
            }
            Err(_) => {
                // The write may still land; do not trust the cache either way.
                warn!("Remote write timed out after {:?}", deadline);
                self.invalidate().await;
                Err(ContentError::Timeout(deadline))
            }
        }
    }

    async fn load(&self, key: FetchKey) -> Loaded {
        let (seq, fetch) = {
            let mut state = self.state.lock().await;
            if state.is_fresh(key, Instant::now(), self.settings.ttl) {
                state.cache_hits += 1;
                return Loaded::Cached(state.records_for(key));
            }
            let running = state
                .in_flight
                .get(&key)
                .map(|flight| (flight.seq, flight.fetch.clone()));
            match running {
                // A refresh is running; stale data beats waiting for it.
                Some(_) if state.initial_fetch_done => {
                    state.cache_hits += 1;
                    return Loaded::Cached(state.records_for(key));
                }
                Some(joined) => joined,
                None => self.start_fetch(&mut state, key),
            }
        };

        let deadline = match key {
            FetchKey::Catalog => self.settings.catalog_timeout,
            FetchKey::Type(_) => self.settings.type_timeout,
        };

        match timeout(deadline, fetch).await {
            Ok(Ok(records)) => Loaded::Remote(records.as_ref().clone()),
            Ok(Err(failure)) => {
                warn!(?key, "Content fetch failed: {}", failure);
                Loaded::Failed(failure)
            }
            Err(_) => {
                warn!(?key, "Content fetch timed out after {:?}", deadline);
                // Let the next read start a new fetch; this one keeps running.
                self.state.lock().await.clear_flight(key, seq);
                Loaded::Failed(FetchFailure::Timeout(deadline))
            }
        }
    }

    fn start_fetch(&self, state: &mut CacheState, key: FetchKey) -> (u64, SharedFetch) {
        let seq = state.issue_seq();
        let epoch = state.epoch;
        state.issued.insert(key, seq);
        state.remote_reads += 1;

        let store = self.store.clone();
        let shared_state = self.state.clone();
        let task = tokio::spawn(async move {
            let result = match key {
                FetchKey::Catalog => store.get_all().await,
                FetchKey::Type(t) => store.get_by_type(t).await,
            };

            let mut state = shared_state.lock().await;
            match result {
                Ok(docs) => {
                    let records = decode_all(docs);
                    if state.finish(key, seq, epoch, &records) {
                        debug!(?key, seq, count = records.len(), "Content fetch applied");
                    }
                    Ok(Arc::new(records))
                }
                Err(e) => {
                    state.clear_flight(key, seq);
                    Err(FetchFailure::Store(e))
                }
            }
        });

        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(FetchFailure::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(key, InFlight { seq, fetch: fetch.clone() });
        (seq, fetch)
    }
}
