//! Public catalogue of published avatars, music and videos.

use axum::Json;
use axum::extract::{Path, Query, State};

use avazon_core::content::PublishedContent;
use avazon_types::avatar::{Avatar, ContentKind};

use crate::http::error::AppError;
use crate::http::extractors::query::ListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

fn parse_kind(raw: &str) -> Result<ContentKind, AppError> {
    raw.parse().map_err(AppError::Validation)
}

/// GET /api/v1/avatar
pub async fn list_avatars(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Avatar>>>, AppError> {
    let timer = RequestTimer::start();
    let avatars = state.catalog.list_avatars(query.page()).await?;
    Ok(timer.finish(avatars))
}

/// GET /api/v1/avatar/{id}
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Avatar>>, AppError> {
    let timer = RequestTimer::start();
    let avatar = state.catalog.get_avatar(&id).await?;
    Ok(timer.finish(avatar))
}

/// GET /api/v1/avatar/contents/{kind}
pub async fn list_contents(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<PublishedContent>>>, AppError> {
    let timer = RequestTimer::start();
    let contents = state
        .catalog
        .list_contents(parse_kind(&kind)?, query.avatar_id(), query.page())
        .await?;
    Ok(timer.finish(contents))
}

/// GET /api/v1/avatar/contents/{kind}/{id}
pub async fn get_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PublishedContent>>, AppError> {
    let timer = RequestTimer::start();
    let content = state.catalog.get_content(parse_kind(&kind)?, &id).await?;
    Ok(timer.finish(content))
}
