use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{LoginPolicy, ReconcileReport, WatchProgress};
use super::repository::{ProgressError, ProgressRemote};
use crate::common::clock::now_millis;
use crate::infrastructure::kv::{KeyValueStore, device_key};
use crate::modules::auth::model::Viewer;

const LOCAL_PREFIX: &str = "progress:";

/// Local key for one viewing position. Episode-scoped entries carry the
/// season and episode so that positions in different episodes never collide.
pub fn local_progress_key(content_id: &str, season_id: Option<&str>, episode_id: Option<&str>) -> String {
    match episode_id {
        Some(episode_id) => format!(
            "{}{}-{}-{}",
            LOCAL_PREFIX,
            content_id,
            season_id.unwrap_or_default(),
            episode_id
        ),
        None => format!("{}{}", LOCAL_PREFIX, content_id),
    }
}

/// Watch positions routed to the remote store for signed-in viewers and to
/// per-device local storage for anonymous ones.
///
/// Everything here is best-effort: failures are logged, reads fall back to
/// "not started" and writes are dropped.
pub struct ProgressStore {
    remote: Arc<dyn ProgressRemote>,
    local: Arc<dyn KeyValueStore>,
    policy: LoginPolicy,
}

impl ProgressStore {
    pub fn new(remote: Arc<dyn ProgressRemote>, local: Arc<dyn KeyValueStore>, policy: LoginPolicy) -> Self {
        Self { remote, local, policy }
    }

    pub fn policy(&self) -> LoginPolicy {
        self.policy
    }

    /// Resume position in percent, `0.0` when nothing applies.
    pub async fn get_progress(
        &self,
        viewer: &Viewer,
        content_id: &str,
        season_id: Option<&str>,
        episode_id: Option<&str>,
    ) -> f64 {
        match self.find(viewer, content_id, season_id, episode_id).await {
            Ok(Some(record)) => record.progress,
            Ok(None) => 0.0,
            Err(e) => {
                warn!(content_id, error = %e, "Failed to read watch progress");
                0.0
            }
        }
    }

    /// The stored record behind [`get_progress`](Self::get_progress).
    pub async fn find(
        &self,
        viewer: &Viewer,
        content_id: &str,
        season_id: Option<&str>,
        episode_id: Option<&str>,
    ) -> Result<Option<WatchProgress>, ProgressError> {
        match viewer {
            Viewer::Authenticated { user_id, .. } => {
                let record = self.remote.get(*user_id, content_id).await?;
                // A different episode is a new viewing, not a resume point.
                Ok(record.filter(|r| r.episode_id.as_deref() == episode_id))
            }
            Viewer::Anonymous { device_id } => {
                let key = device_key(device_id, &local_progress_key(content_id, season_id, episode_id));
                let record: Option<WatchProgress> = match self.local.get(&key).await? {
                    Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| ProgressError::Local(e.into()))?),
                    None => None,
                };
                // Dash-joined keys can be shared by different positions.
                Ok(record.filter(|r| {
                    r.content_id == content_id
                        && r.episode_id.as_deref() == episode_id
                        && (episode_id.is_none() || r.season_id.as_deref() == season_id)
                }))
            }
        }
    }

    /// Records a viewing position. Throttling is left to the caller.
    pub async fn save_progress(
        &self,
        viewer: &Viewer,
        content_id: &str,
        progress: f64,
        season_id: Option<&str>,
        episode_id: Option<&str>,
    ) -> Option<WatchProgress> {
        let record = WatchProgress::new(content_id, progress, season_id, episode_id, now_millis());
        match self.write(viewer, &record).await {
            Ok(()) => {
                debug!(content_id, progress = record.progress, "Saved watch progress");
                Some(record)
            }
            Err(e) => {
                warn!(content_id, error = %e, "Dropped watch progress update");
                None
            }
        }
    }

    async fn write(&self, viewer: &Viewer, record: &WatchProgress) -> Result<(), ProgressError> {
        match viewer {
            Viewer::Authenticated { user_id, .. } => self.remote.upsert(*user_id, record).await,
            Viewer::Anonymous { device_id } => {
                let key = device_key(
                    device_id,
                    &local_progress_key(
                        &record.content_id,
                        record.season_id.as_deref(),
                        record.episode_id.as_deref(),
                    ),
                );
                let raw = serde_json::to_string(record).map_err(|e| ProgressError::Local(e.into()))?;
                self.local.set(&key, &raw).await?;
                Ok(())
            }
        }
    }

    /// Everything the viewer has started, most recently watched first.
    pub async fn list_progress(&self, viewer: &Viewer) -> Vec<WatchProgress> {
        let listed = match viewer {
            Viewer::Authenticated { user_id, .. } => self.remote.list(*user_id).await,
            Viewer::Anonymous { device_id } => self.local_entries(device_id).await.map(|entries| {
                entries.into_iter().map(|(_, record)| record).collect()
            }),
        };

        match listed {
            Ok(mut records) => {
                records.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
                records
            }
            Err(e) => {
                warn!(error = %e, "Failed to list watch progress");
                Vec::new()
            }
        }
    }

    /// Local entries for a device with their full storage keys. Unreadable
    /// entries are skipped.
    async fn local_entries(&self, device_id: &str) -> Result<Vec<(String, WatchProgress)>, ProgressError> {
        let prefix = device_key(device_id, LOCAL_PREFIX);
        let mut entries = Vec::new();

        for key in self.local.keys(&prefix).await? {
            let Some(raw) = self.local.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<WatchProgress>(&raw) {
                Ok(record) => entries.push((key, record)),
                Err(e) => warn!(%key, error = %e, "Skipping unreadable local progress entry"),
            }
        }

        Ok(entries)
    }

    /// Applies the configured login policy to the anonymous progress left on
    /// `device_id` now that `user_id` has signed in.
    pub async fn reconcile_login(&self, device_id: &str, user_id: Uuid) -> Result<ReconcileReport, ProgressError> {
        let entries = self.local_entries(device_id).await?;
        let mut report = ReconcileReport {
            policy: self.policy,
            ..Default::default()
        };

        if self.policy == LoginPolicy::Discard {
            report.left_local = entries.len();
            info!(%user_id, left_local = report.left_local, "Login reconcile: local progress left in place");
            return Ok(report);
        }

        // The remote store holds one record per content item, so only the
        // newest local entry per item can win.
        let mut newest: HashMap<String, (String, WatchProgress)> = HashMap::new();
        let mut superseded = Vec::new();
        for (key, record) in entries {
            match newest.get(&record.content_id) {
                Some((_, current)) if current.last_watched_at >= record.last_watched_at => {
                    superseded.push(key);
                }
                _ => {
                    if let Some((old_key, _)) = newest.insert(record.content_id.clone(), (key, record)) {
                        superseded.push(old_key);
                    }
                }
            }
        }

        let mut candidates: Vec<(String, WatchProgress)> = newest.into_values().collect();
        candidates.sort_by_key(|(_, r)| r.last_watched_at);

        for (key, record) in candidates {
            let remote = match self.remote.get(user_id, &record.content_id).await {
                Ok(remote) => remote,
                Err(e) => {
                    warn!(content_id = %record.content_id, error = %e, "Login reconcile: remote read failed");
                    report.left_local += 1;
                    continue;
                }
            };

            if remote.is_some_and(|r| r.last_watched_at >= record.last_watched_at) {
                superseded.push(key);
                continue;
            }

            match self.remote.upsert(user_id, &record).await {
                Ok(()) => {
                    report.uploaded += 1;
                    self.local.delete(&key).await?;
                }
                Err(e) => {
                    warn!(content_id = %record.content_id, error = %e, "Login reconcile: upload failed");
                    report.left_local += 1;
                }
            }
        }

        report.skipped = superseded.len();
        for key in &superseded {
            self.local.delete(key).await?;
        }

        info!(
            %user_id,
            uploaded = report.uploaded,
            skipped = report.skipped,
            left_local = report.left_local,
            "Login reconcile finished"
        );
        Ok(report)
    }
}
