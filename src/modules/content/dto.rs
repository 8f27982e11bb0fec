use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::cache::CacheStats;
use super::model::{ContentPatch, ContentType, NewContent, Season, VideoSource};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequest {
    pub id: Option<String>,
    #[validate(url(message = "Source must be a valid URL"))]
    pub embed_url: String,
}

fn build_sources(owner: &str, sources: Vec<SourceRequest>) -> Vec<VideoSource> {
    sources
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let id = s.id.unwrap_or_else(|| format!("{}-src-{}", owner, i + 1));
            VideoSource::from_embed_url(id, s.embed_url)
        })
        .collect()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentRequest {
    #[validate(length(min = 1, max = 128, message = "Id must be 1-128 characters"))]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub poster_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub sources: Vec<SourceRequest>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub anime: bool,
    #[validate(range(min = 1870, max = 2100, message = "Release year out of range"))]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration: Option<u32>,
    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl From<CreateContentRequest> for NewContent {
    fn from(req: CreateContentRequest) -> Self {
        // Source ids need an owner before the store assigns the record id.
        let owner = req
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().as_simple().to_string()[..8].to_string());

        NewContent {
            id: req.id,
            title: req.title.trim().to_string(),
            description: req.description,
            image_url: req.image_url,
            poster_url: req.poster_url,
            video_url: req.video_url,
            sources: build_sources(&owner, req.sources),
            content_type: req.content_type,
            anime: req.anime,
            release_year: req.release_year,
            genres: normalize_genres(req.genres),
            duration: req.duration,
            seasons: req.seasons,
        }
    }
}

fn normalize_genres(genres: Vec<String>) -> BTreeSet<String> {
    genres
        .into_iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect()
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub poster_url: Option<String>,
    pub video_url: Option<String>,
    #[validate(nested)]
    pub sources: Option<Vec<SourceRequest>>,
    pub anime: Option<bool>,
    #[validate(range(min = 1870, max = 2100, message = "Release year out of range"))]
    pub release_year: Option<i32>,
    pub genres: Option<Vec<String>>,
    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration: Option<u32>,
    pub seasons: Option<Vec<Season>>,
}

impl UpdateContentRequest {
    pub fn into_patch(self, id: &str) -> ContentPatch {
        ContentPatch {
            title: self.title.map(|t| t.trim().to_string()),
            description: self.description,
            image_url: self.image_url,
            poster_url: self.poster_url,
            video_url: self.video_url,
            sources: self.sources.map(|s| build_sources(id, s)),
            anime: self.anime,
            release_year: self.release_year,
            genres: self.genres.map(normalize_genres),
            duration: self.duration,
            seasons: self.seasons,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SeriesQuery {
    /// Only anime (`true`) or only non-anime (`false`) series.
    pub anime: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportSourceQuery {
    /// Episode owning the source, for series.
    pub episode_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheHealthResponse {
    pub status: String,
    pub cache: CacheStats,
}
