use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

/// Reports after which a source is considered broken.
pub const REPORT_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

impl ContentType {
    pub const ALL: [ContentType; 2] = [ContentType::Movie, ContentType::Series];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ContentType::Movie),
            "series" => Ok(ContentType::Series),
            // anime is catalogued as a series variant
            "anime" => Ok(ContentType::Series),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

fn default_working() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    pub id: String,
    pub provider: String,
    pub embed_url: String,
    #[serde(default = "default_working")]
    pub is_working: bool,
    #[serde(default)]
    pub report_count: u32,
}

impl VideoSource {
    pub fn from_embed_url(id: impl Into<String>, embed_url: impl Into<String>) -> Self {
        let embed_url = embed_url.into();
        Self {
            id: id.into(),
            provider: provider_from_url(&embed_url),
            embed_url,
            is_working: true,
            report_count: 0,
        }
    }

    /// Records a playback failure report. The counter never decreases.
    pub fn report(&mut self) {
        self.report_count = self.report_count.saturating_add(1);
        if self.report_count >= REPORT_THRESHOLD {
            self.is_working = false;
        }
    }
}

fn provider_from_url(embed_url: &str) -> String {
    Url::parse(embed_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .map(|host| host.strip_prefix("www.").map(str::to_owned).unwrap_or(host))
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<VideoSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<VideoSource>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub anime: bool,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// A snapshot as handed back by the remote store: the document key plus an
/// untrusted JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub key: String,
    pub value: Value,
}

impl RawDocument {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("document '{0}' is not an object")]
    NotAnObject(String),
    #[error("document '{key}' is malformed: {reason}")]
    Malformed { key: String, reason: String },
    #[error("document key '{key}' does not match record id '{id}'")]
    IdMismatch { key: String, id: String },
    #[error("record '{0}' has an empty id or title")]
    MissingIdentity(String),
    #[error("movie '{0}' cannot have seasons")]
    MovieWithSeasons(String),
    #[error("movie '{0}' cannot be flagged as anime")]
    AnimeMovie(String),
    #[error("record '{id}' repeats episode number {number} in season {season}")]
    DuplicateEpisodeNumber { id: String, season: u32, number: u32 },
    #[error("record '{id}' repeats episode id '{episode}'")]
    DuplicateEpisodeId { id: String, episode: String },
}

impl ContentRecord {
    pub fn decode(raw: RawDocument) -> Result<Self, DecodeError> {
        let RawDocument { key, mut value } = raw;

        // Keyed documents may omit the id in their body.
        match value.as_object_mut() {
            Some(obj) => {
                obj.entry("id").or_insert_with(|| Value::String(key.clone()));
            }
            None => return Err(DecodeError::NotAnObject(key)),
        }

        let record: ContentRecord = serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        if record.id != key {
            return Err(DecodeError::IdMismatch { key, id: record.id });
        }

        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.id.trim().is_empty() || self.title.trim().is_empty() {
            return Err(DecodeError::MissingIdentity(self.id.clone()));
        }
        check_shape(&self.id, self.content_type, self.anime, &self.seasons)
    }

    pub fn episode(&self, episode_id: &str) -> Option<&Episode> {
        self.seasons
            .iter()
            .flat_map(|s| s.episodes.iter())
            .find(|e| e.id == episode_id)
    }
}

/// Type-dependent invariants shared by stored records and new submissions.
pub fn check_shape(
    id: &str,
    content_type: ContentType,
    anime: bool,
    seasons: &[Season],
) -> Result<(), DecodeError> {
    if content_type == ContentType::Movie {
        if !seasons.is_empty() {
            return Err(DecodeError::MovieWithSeasons(id.to_string()));
        }
        if anime {
            return Err(DecodeError::AnimeMovie(id.to_string()));
        }
    }

    let mut episode_ids = HashSet::new();
    for season in seasons {
        let mut numbers = HashSet::new();
        for episode in &season.episodes {
            if !numbers.insert(episode.number) {
                return Err(DecodeError::DuplicateEpisodeNumber {
                    id: id.to_string(),
                    season: season.number,
                    number: episode.number,
                });
            }
            if !episode_ids.insert(episode.id.as_str()) {
                return Err(DecodeError::DuplicateEpisodeId {
                    id: id.to_string(),
                    episode: episode.id.clone(),
                });
            }
        }
    }

    Ok(())
}

/// A record as submitted for creation. The store assigns `id` when absent and
/// always assigns the timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub poster_url: Option<String>,
    pub video_url: Option<String>,
    pub sources: Vec<VideoSource>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub anime: bool,
    pub release_year: Option<i32>,
    pub genres: BTreeSet<String>,
    pub duration: Option<u32>,
    pub seasons: Vec<Season>,
}

/// Fields to merge into an existing record; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<VideoSource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasons: Option<Vec<Season>>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.poster_url.is_none()
            && self.video_url.is_none()
            && self.sources.is_none()
            && self.anime.is_none()
            && self.release_year.is_none()
            && self.genres.is_none()
            && self.duration.is_none()
            && self.seasons.is_none()
    }

    /// Rejects patches that would leave record `id` unreadable once merged.
    /// Type-dependent rules need the stored record and are checked by callers.
    pub fn check(&self, id: &str) -> Result<(), DecodeError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(DecodeError::MissingIdentity(id.to_string()));
        }
        match &self.seasons {
            Some(seasons) => check_shape(id, ContentType::Series, false, seasons),
            None => Ok(()),
        }
    }
}
