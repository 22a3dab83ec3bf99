//! Video creation endpoints: thumbnail first, then the video itself.

use axum::Json;
use axum::extract::{Path, Query, State};

use avazon_types::avatar::AvatarVideo;
use avazon_types::content::{VideoCreation, VideoImageRequest, VideoRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::extractors::query::{ContentIdQuery, ListQuery};
use crate::http::handlers::parse_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/avatar/{avatar_id}/contents/create/video/image
pub async fn start_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(avatar_id): Path<String>,
    Json(body): Json<VideoImageRequest>,
) -> Result<Json<ApiResponse<VideoCreation>>, AppError> {
    let timer = RequestTimer::start();
    let video = state.video.start_image(&user_id, &avatar_id, body).await?;
    Ok(timer.finish(video))
}

/// POST /api/v1/contents/creations/video/{id}/create
pub async fn create_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<VideoRequest>,
) -> Result<Json<ApiResponse<VideoCreation>>, AppError> {
    let timer = RequestTimer::start();
    let video = state.video.create_video(&user_id, &parse_id(&id)?, body).await?;
    Ok(timer.finish(video))
}

/// GET /api/v1/contents/creations/video
pub async fn list_videos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<VideoCreation>>>, AppError> {
    let timer = RequestTimer::start();
    let rows = state.video.list(&user_id, query.avatar_id(), query.page()).await?;
    Ok(timer.finish(rows))
}

/// GET /api/v1/contents/creations/video/{id}
pub async fn get_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<VideoCreation>>, AppError> {
    let timer = RequestTimer::start();
    let video = state.video.get(&user_id, &parse_id(&id)?).await?;
    Ok(timer.finish(video))
}

/// POST /api/v1/contents/creations/video/{id}/confirm?content_id=
pub async fn confirm_video(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ContentIdQuery>,
) -> Result<Json<ApiResponse<AvatarVideo>>, AppError> {
    let timer = RequestTimer::start();
    let published = state
        .video
        .confirm(&user_id, &parse_id(&id)?, &query.content_id)
        .await?;
    Ok(timer.finish(published))
}
