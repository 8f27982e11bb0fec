//! Built-in catalog served when the remote store cannot be reached and nothing
//! is cached, so primary navigation never renders an unrecoverable empty state.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::model::{ContentRecord, ContentType, Episode, Season, VideoSource};

pub const SEED_MOVIE_ID: &str = "fallback-movie-1";
pub const SEED_SERIES_ID: &str = "fallback-series-1";

static SEED: LazyLock<Vec<ContentRecord>> = LazyLock::new(build_seed);

fn genres(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|g| g.to_string()).collect()
}

fn build_seed() -> Vec<ContentRecord> {
    vec![
        ContentRecord {
            id: SEED_MOVIE_ID.to_string(),
            title: "Featured Movie".to_string(),
            description: "The catalog is temporarily unavailable. Showing a featured title.".to_string(),
            image_url: Some("/static/fallback/movie-backdrop.jpg".to_string()),
            poster_url: Some("/static/fallback/movie-poster.jpg".to_string()),
            video_url: None,
            sources: vec![VideoSource::from_embed_url(
                "fallback-movie-1-src-1",
                "https://www.youtube.com/embed/aqz-KE-bpKQ",
            )],
            content_type: ContentType::Movie,
            anime: false,
            release_year: Some(2008),
            genres: genres(&["animation", "comedy"]),
            duration: Some(10),
            seasons: Vec::new(),
            created_at: 0,
            updated_at: 0,
        },
        ContentRecord {
            id: SEED_SERIES_ID.to_string(),
            title: "Featured Series".to_string(),
            description: "The catalog is temporarily unavailable. Showing a featured series.".to_string(),
            image_url: Some("/static/fallback/series-backdrop.jpg".to_string()),
            poster_url: Some("/static/fallback/series-poster.jpg".to_string()),
            video_url: None,
            sources: Vec::new(),
            content_type: ContentType::Series,
            anime: false,
            release_year: Some(2010),
            genres: genres(&["adventure"]),
            duration: None,
            seasons: vec![Season {
                number: 1,
                title: "Season 1".to_string(),
                episodes: vec![Episode {
                    id: "fallback-series-1-s1e1".to_string(),
                    number: 1,
                    title: "Pilot".to_string(),
                    description: String::new(),
                    duration: Some(24),
                    video_url: None,
                    sources: vec![VideoSource::from_embed_url(
                        "fallback-series-1-s1e1-src-1",
                        "https://player.vimeo.com/video/76979871",
                    )],
                }],
            }],
            created_at: 0,
            updated_at: 0,
        },
    ]
}

pub fn seed_catalog() -> Vec<ContentRecord> {
    SEED.clone()
}

pub fn seed_by_id(id: &str) -> Option<ContentRecord> {
    SEED.iter().find(|r| r.id == id).cloned()
}

pub fn seed_by_type(content_type: ContentType) -> Vec<ContentRecord> {
    SEED.iter()
        .filter(|r| r.content_type == content_type)
        .cloned()
        .collect()
}
