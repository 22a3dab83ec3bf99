//! Music creation endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};

use avazon_types::avatar::AvatarMusic;
use avazon_types::content::{MusicCreation, MusicRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::extractors::query::{ContentIdQuery, ListQuery};
use crate::http::handlers::parse_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/avatar/{avatar_id}/contents/create/music
pub async fn start_music(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(avatar_id): Path<String>,
    Json(body): Json<MusicRequest>,
) -> Result<Json<ApiResponse<MusicCreation>>, AppError> {
    let timer = RequestTimer::start();
    let music = state.music.start(&user_id, &avatar_id, body).await?;
    Ok(timer.finish(music))
}

/// GET /api/v1/contents/creations/music
pub async fn list_music(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<MusicCreation>>>, AppError> {
    let timer = RequestTimer::start();
    let rows = state.music.list(&user_id, query.avatar_id(), query.page()).await?;
    Ok(timer.finish(rows))
}

/// GET /api/v1/contents/creations/music/{id}
pub async fn get_music(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MusicCreation>>, AppError> {
    let timer = RequestTimer::start();
    let music = state.music.get(&user_id, &parse_id(&id)?).await?;
    Ok(timer.finish(music))
}

/// POST /api/v1/contents/creations/music/{id}/regenerate-image
pub async fn regenerate_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MusicCreation>>, AppError> {
    let timer = RequestTimer::start();
    let music = state.music.regenerate_image(&user_id, &parse_id(&id)?).await?;
    Ok(timer.finish(music))
}

/// POST /api/v1/contents/creations/music/{id}/confirm?content_id=
pub async fn confirm_music(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ContentIdQuery>,
) -> Result<Json<ApiResponse<AvatarMusic>>, AppError> {
    let timer = RequestTimer::start();
    let published = state
        .music
        .confirm(&user_id, &parse_id(&id)?, &query.content_id)
        .await?;
    Ok(timer.finish(published))
}
