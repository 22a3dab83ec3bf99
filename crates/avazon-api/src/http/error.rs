//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;
use uuid::Uuid;

use avazon_types::error::{ContentError, CreationError, PromptError, ValidationError};

use crate::http::response::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    Creation(CreationError),
    Content(ContentError),
    Prompt(PromptError),
    Unauthorized(String),
    Forbidden(String),
    Validation(String),
    Internal(String),
}

impl From<CreationError> for AppError {
    fn from(e: CreationError) -> Self {
        AppError::Creation(e)
    }
}

impl From<ContentError> for AppError {
    fn from(e: ContentError) -> Self {
        AppError::Content(e)
    }
}

impl From<PromptError> for AppError {
    fn from(e: PromptError) -> Self {
        AppError::Prompt(e)
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl AppError {
    /// Status, code and message for the error envelope.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        use StatusCode as S;
        let message = self.to_string();
        let (status, code) = match self {
            AppError::Creation(e) => match e {
                CreationError::NotFound => (S::NOT_FOUND, "NOT_FOUND"),
                CreationError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                CreationError::Blocked(_) => (S::CONFLICT, "BLOCKED"),
                CreationError::ImageNotCompleted => (S::CONFLICT, "IMAGE_NOT_COMPLETED"),
                CreationError::CharacterNotCompleted => (S::CONFLICT, "CHARACTER_NOT_COMPLETED"),
                CreationError::VoiceNotCompleted => (S::CONFLICT, "VOICE_NOT_COMPLETED"),
                CreationError::SessionNotActive(_) => (S::CONFLICT, "SESSION_NOT_ACTIVE"),
                CreationError::SessionClosed => (S::CONFLICT, "SESSION_CLOSED"),
                CreationError::Conflict(_) => (S::CONFLICT, "CONFLICT"),
                CreationError::InvalidTransition(_) => (S::CONFLICT, "INVALID_TRANSITION"),
                CreationError::Agent(_) | CreationError::Storage(_) => {
                    (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
            AppError::Content(e) => match e {
                ContentError::NotFound | ContentError::AvatarNotFound => (S::NOT_FOUND, "NOT_FOUND"),
                ContentError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                ContentError::NotStarted => (S::CONFLICT, "NOT_STARTED"),
                ContentError::StillProcessing => (S::CONFLICT, "STILL_PROCESSING"),
                ContentError::AlreadyConfirmed => (S::CONFLICT, "ALREADY_CONFIRMED"),
                ContentError::ContentNotCompleted => (S::CONFLICT, "CONTENT_NOT_COMPLETED"),
                ContentError::ContentAlreadyCreated => (S::CONFLICT, "CONTENT_ALREADY_CREATED"),
                ContentError::Failed => (S::CONFLICT, "CREATION_FAILED"),
                ContentError::Conflict(_) => (S::CONFLICT, "CONFLICT"),
                ContentError::InvalidTransition(_) => (S::CONFLICT, "INVALID_TRANSITION"),
                ContentError::Storage(_) => (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            AppError::Prompt(e) => match e {
                PromptError::NotFound | PromptError::Unassigned(_) => (S::NOT_FOUND, "NOT_FOUND"),
                PromptError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                PromptError::Completion(_) | PromptError::Storage(_) => {
                    (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
            AppError::Unauthorized(_) => (S::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (S::FORBIDDEN, "FORBIDDEN"),
            AppError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Internal(_) => (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        (status, code, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Creation(e) => write!(f, "{e}"),
            AppError::Content(e) => write!(f, "{e}"),
            AppError::Prompt(e) => write!(f, "{e}"),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            error!(code, error = %message, "request failed");
        }
        let body = ApiResponse::error(code, message, Uuid::now_v7().to_string(), 0);
        (status, Json(body)).into_response()
    }
}
