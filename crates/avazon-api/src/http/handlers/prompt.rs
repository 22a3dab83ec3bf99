//! System prompt administration. Every route requires `X-Admin-Key`.

use axum::Json;
use axum::extract::{Path, State};

use avazon_types::prompt::{Agent, SystemPrompt, SystemPromptUsage, UpsertPromptRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::AdminKey;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

fn parse_agent(raw: &str) -> Result<Agent, AppError> {
    raw.parse().map_err(AppError::Validation)
}

/// POST /api/v1/system-prompts/{id}
pub async fn upsert_prompt(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
    Json(body): Json<UpsertPromptRequest>,
) -> Result<Json<ApiResponse<SystemPrompt>>, AppError> {
    let timer = RequestTimer::start();
    let prompt = state.prompts.upsert_prompt(&id, body).await?;
    Ok(timer.finish(prompt))
}

/// GET /api/v1/system-prompts
pub async fn list_prompts(
    State(state): State<AppState>,
    _admin: AdminKey,
) -> Result<Json<ApiResponse<Vec<SystemPrompt>>>, AppError> {
    let timer = RequestTimer::start();
    let prompts = state.prompts.list_prompts().await?;
    Ok(timer.finish(prompts))
}

/// DELETE /api/v1/system-prompts/{id}
pub async fn delete_prompt(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    state.prompts.delete_prompt(&id).await?;
    Ok(timer.finish(serde_json::json!({ "deleted": id })))
}

/// POST /api/v1/system-prompts/usages/{agent}/use/{prompt_id}
pub async fn set_usage(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path((agent, prompt_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SystemPromptUsage>>, AppError> {
    let timer = RequestTimer::start();
    let usage = state.prompts.set_usage(parse_agent(&agent)?, &prompt_id).await?;
    Ok(timer.finish(usage))
}

/// GET /api/v1/system-prompts/usages
pub async fn list_usages(
    State(state): State<AppState>,
    _admin: AdminKey,
) -> Result<Json<ApiResponse<Vec<SystemPromptUsage>>>, AppError> {
    let timer = RequestTimer::start();
    let usages = state.prompts.list_usages().await?;
    Ok(timer.finish(usages))
}

/// DELETE /api/v1/system-prompts/usages/{agent}
pub async fn delete_usage(
    State(state): State<AppState>,
    _admin: AdminKey,
    Path(agent): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    let agent = parse_agent(&agent)?;
    state.prompts.delete_usage(agent).await?;
    Ok(timer.finish(serde_json::json!({ "deleted": agent.as_str() })))
}
