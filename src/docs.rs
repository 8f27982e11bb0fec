use utoipa::OpenApi;
use crate::common::response::Degraded;
use crate::modules::content::cache::CacheStats;
use crate::modules::content::dto::*;
use crate::modules::content::model::{ContentRecord, ContentType, Episode, Season, VideoSource};
use crate::modules::favorites::handler::FavoriteStatus;
use crate::modules::favorites::model::FavoriteEntry;
use crate::modules::progress::dto::{ProgressResponse, SaveProgressRequest};
use crate::modules::progress::model::{LoginPolicy, ReconcileReport, WatchProgress};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::content::handler::list_content,
        crate::modules::content::handler::get_content,
        crate::modules::content::handler::list_movies,
        crate::modules::content::handler::list_series,
        crate::modules::content::handler::create_content,
        crate::modules::content::handler::update_content,
        crate::modules::content::handler::delete_content,
        crate::modules::content::handler::report_source,
        crate::modules::content::handler::cache_health,
        crate::modules::progress::handler::get_progress,
        crate::modules::progress::handler::save_progress,
        crate::modules::progress::handler::list_progress,
        crate::modules::progress::handler::reconcile_progress,
        crate::modules::favorites::handler::list_favorites,
        crate::modules::favorites::handler::get_favorite,
        crate::modules::favorites::handler::add_favorite,
        crate::modules::favorites::handler::remove_favorite,
    ),
    components(
        schemas(
            ContentRecord, ContentType, Season, Episode, VideoSource,
            CreateContentRequest, UpdateContentRequest, SourceRequest,
            CacheHealthResponse, CacheStats, Degraded,
            WatchProgress, SaveProgressRequest, ProgressResponse, ReconcileReport, LoginPolicy,
            FavoriteEntry, FavoriteStatus,
        )
    ),
    tags(
        (name = "Content", description = "Cached catalog reads and admin writes"),
        (name = "Progress", description = "Watch progress per viewer"),
        (name = "Favorites", description = "Favorite content per viewer"),
        (name = "Health", description = "Service and cache health")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
