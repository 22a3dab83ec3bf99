//! Avatar creation session endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};

use avazon_types::avatar::Avatar;
use avazon_types::creation::{AvatarCreation, AvatarCreationDetail, StartCreationRequest, SubObject};
use avazon_types::tool::{ImageParams, ToolCall, VoiceParams};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::extractors::query::AvatarIdQuery;
use crate::http::handlers::parse_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/avatar/create/new
pub async fn start_creation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<StartCreationRequest>,
) -> Result<Json<ApiResponse<AvatarCreation>>, AppError> {
    let timer = RequestTimer::start();
    let creation = state.creation.start_creation(&user_id, body).await?;
    Ok(timer.finish(creation))
}

/// GET /api/v1/avatar/create/{id}
pub async fn get_creation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AvatarCreationDetail>>, AppError> {
    let timer = RequestTimer::start();
    let detail = state.creation.get_creation(&user_id, &parse_id(&id)?).await?;
    Ok(timer.finish(detail))
}

/// POST /api/v1/avatar/create/{id}?avatar_id= - publish the finished avatar.
pub async fn publish_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Query(query): Query<AvatarIdQuery>,
) -> Result<Json<ApiResponse<Avatar>>, AppError> {
    let timer = RequestTimer::start();
    let avatar = state
        .creation
        .publish_avatar(&user_id, &parse_id(&id)?, &query.avatar_id)
        .await?;
    Ok(timer.finish(avatar))
}

/// POST /api/v1/avatar/create/{id}/image
pub async fn create_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<ImageParams>,
) -> Result<Json<ApiResponse<SubObject>>, AppError> {
    run_tool(state, user_id, &id, ToolCall::CreateImage(body)).await
}

/// POST /api/v1/avatar/create/{id}/character
pub async fn create_character(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SubObject>>, AppError> {
    run_tool(state, user_id, &id, ToolCall::CreateCharacter).await
}

/// POST /api/v1/avatar/create/{id}/voice
pub async fn create_voice(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<VoiceParams>,
) -> Result<Json<ApiResponse<SubObject>>, AppError> {
    body.validate()?;
    run_tool(state, user_id, &id, ToolCall::CreateVoice(body)).await
}

async fn run_tool(
    state: AppState,
    user_id: String,
    id: &str,
    call: ToolCall,
) -> Result<Json<ApiResponse<SubObject>>, AppError> {
    let timer = RequestTimer::start();
    let row = state.creation.create(&user_id, &parse_id(id)?, call).await?;
    Ok(timer.finish(row))
}
