//! HTTP request handlers for the REST API.

pub mod catalog;
pub mod creation;
pub mod music;
pub mod prompt;
pub mod remix;
pub mod video;
pub mod ws;

use uuid::Uuid;

use crate::http::error::AppError;

/// Parse a creation id path segment.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid id: '{raw}'")))
}
