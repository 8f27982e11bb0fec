use super::cache::{ContentError, Served};
use super::dto::{CreateContentRequest, UpdateContentRequest};
use super::model::{ContentPatch, ContentRecord, ContentType, NewContent, VideoSource};
use crate::state::AppState;
use tracing::info;

pub struct ContentService;

impl ContentService {
    pub async fn list_all(state: AppState) -> Served<Vec<ContentRecord>> {
        state.content.get_all().await
    }

    pub async fn get(state: AppState, id: &str) -> Served<Option<ContentRecord>> {
        state.content.get_by_id(id).await
    }

    pub async fn list_by_type(
        state: AppState,
        content_type: ContentType,
        anime: Option<bool>,
    ) -> Served<Vec<ContentRecord>> {
        let mut served = state.content.get_by_type(content_type).await;
        if let Some(anime) = anime {
            served.value.retain(|r| r.anime == anime);
        }
        served
    }

    pub async fn create(state: AppState, req: CreateContentRequest) -> Result<ContentRecord, ContentError> {
        state.content.create(NewContent::from(req)).await
    }

    pub async fn update(state: AppState, id: &str, req: UpdateContentRequest) -> Result<ContentRecord, ContentError> {
        let patch = req.into_patch(id);

        // Type-dependent fields need the stored type before they are merged.
        if patch.seasons.as_ref().is_some_and(|s| !s.is_empty()) || patch.anime == Some(true) {
            let current = Self::require_stored(&state, id).await?;
            if current.content_type == ContentType::Movie {
                return Err(ContentError::Invalid(format!(
                    "movie '{}' cannot have seasons or be anime",
                    id
                )));
            }
        }

        state.content.update(id, patch).await
    }

    pub async fn delete(state: AppState, id: &str) -> Result<(), ContentError> {
        state.content.delete(id).await
    }

    /// Counts a playback failure against a source and persists the new count.
    pub async fn report_source(
        state: AppState,
        id: &str,
        source_id: &str,
        episode_id: Option<&str>,
    ) -> Result<VideoSource, ContentError> {
        let mut record = Self::require_stored(&state, id).await?;

        let (reported, patch) = match episode_id {
            Some(episode_id) => {
                let episode = record
                    .seasons
                    .iter_mut()
                    .flat_map(|s| s.episodes.iter_mut())
                    .find(|e| e.id == episode_id)
                    .ok_or_else(|| ContentError::NotFound(format!("{}/{}", id, episode_id)))?;
                let source = report_in(&mut episode.sources, id, source_id)?;
                (
                    source,
                    ContentPatch {
                        seasons: Some(record.seasons),
                        ..Default::default()
                    },
                )
            }
            None => {
                let source = report_in(&mut record.sources, id, source_id)?;
                (
                    source,
                    ContentPatch {
                        sources: Some(record.sources),
                        ..Default::default()
                    },
                )
            }
        };

        state.content.update(id, patch).await?;
        info!(%id, source = %source_id, reports = reported.report_count, working = reported.is_working, "Source reported");
        Ok(reported)
    }

    /// Reads a record that must exist in the remote store; seed records are
    /// not writable.
    async fn require_stored(state: &AppState, id: &str) -> Result<ContentRecord, ContentError> {
        let served = state.content.get_by_id(id).await;
        match (served.value, served.failure) {
            (Some(record), None) => Ok(record),
            (_, Some(reason)) => Err(ContentError::Unavailable {
                id: id.to_string(),
                reason,
            }),
            (None, None) => Err(ContentError::NotFound(id.to_string())),
        }
    }
}

fn report_in(sources: &mut [VideoSource], id: &str, source_id: &str) -> Result<VideoSource, ContentError> {
    let source = sources
        .iter_mut()
        .find(|s| s.id == source_id)
        .ok_or_else(|| ContentError::NotFound(format!("{}/{}", id, source_id)))?;
    source.report();
    Ok(source.clone())
}
