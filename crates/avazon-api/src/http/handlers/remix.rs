//! Avatar remix endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};

use avazon_types::avatar::Avatar;
use avazon_types::remix::{AvatarRemix, RemixRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::extractors::query::{AvatarIdQuery, ListQuery};
use crate::http::handlers::parse_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/avatar/{avatar_id}/remix
pub async fn start_remix(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(avatar_id): Path<String>,
    Json(body): Json<RemixRequest>,
) -> Result<Json<ApiResponse<AvatarRemix>>, AppError> {
    let timer = RequestTimer::start();
    let remix = state.remix.start(&user_id, &avatar_id, body).await?;
    Ok(timer.finish(remix))
}

/// GET /api/v1/remix
pub async fn list_remixes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<AvatarRemix>>>, AppError> {
    let timer = RequestTimer::start();
    let rows = state.remix.list(&user_id, query.avatar_id(), query.page()).await?;
    Ok(timer.finish(rows))
}

/// GET /api/v1/remix/{id}
pub async fn get_remix(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AvatarRemix>>, AppError> {
    let timer = RequestTimer::start();
    let remix = state.remix.get(&user_id, &parse_id(&id)?).await?;
    Ok(timer.finish(remix))
}

/// POST /api/v1/remix/{id}/confirm?avatar_id=
pub async fn confirm_remix(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<AvatarIdQuery>,
) -> Result<Json<ApiResponse<Avatar>>, AppError> {
    let timer = RequestTimer::start();
    let avatar = state
        .remix
        .confirm(&user_id, &parse_id(&id)?, &query.avatar_id)
        .await?;
    Ok(timer.finish(avatar))
}
