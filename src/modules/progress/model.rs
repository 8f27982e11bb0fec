use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Progress above which an item counts as watched.
pub const COMPLETED_ABOVE: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WatchProgress {
    pub content_id: String,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
    pub progress: f64,
    pub completed: bool,
    pub last_watched_at: i64,
}

impl WatchProgress {
    pub fn new(
        content_id: &str,
        progress: f64,
        season_id: Option<&str>,
        episode_id: Option<&str>,
        now: i64,
    ) -> Self {
        let progress = clamp_progress(progress);
        Self {
            content_id: content_id.to_string(),
            season_id: season_id.map(str::to_owned),
            episode_id: episode_id.map(str::to_owned),
            progress,
            completed: progress > COMPLETED_ABOVE,
            last_watched_at: now,
        }
    }
}

pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// What happens to anonymous progress when the viewer signs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoginPolicy {
    /// Local progress is left behind; the remote store becomes the only source.
    #[default]
    Discard,
    /// Local entries newer than the remote record are uploaded, then removed
    /// locally.
    Upload,
}

impl FromStr for LoginPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(LoginPolicy::Discard),
            "upload" => Ok(LoginPolicy::Upload),
            other => Err(format!("unknown login policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub policy: LoginPolicy,
    pub uploaded: usize,
    pub skipped: usize,
    pub left_local: usize,
}
