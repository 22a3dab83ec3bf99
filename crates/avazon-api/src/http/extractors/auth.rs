//! Request authentication.
//!
//! - [`AuthUser`]: `Authorization: Bearer <token>`, verified with the
//!   server's [`TokenSigner`]; yields the user id.
//! - [`AdminKey`]: `X-Admin-Key` matching `AVAZON_ADMIN_KEY`; guards the
//!   system prompt routes.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use avazon_infra::crypto::keys_match;
use avazon_infra::crypto::token::TokenSigner;

use crate::http::error::AppError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_user(&parts.headers, &state.tokens).map(AuthUser)
    }
}

/// The user id carried by a valid bearer token.
pub fn bearer_user(headers: &HeaderMap, tokens: &TokenSigner) -> Result<String, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid Authorization header encoding".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))?;
    tokens.verify(token).map_err(|e| {
        debug!(error = %e, "rejected access token");
        AppError::Unauthorized("invalid access token".to_string())
    })
}

/// Marker for requests carrying the admin key.
pub struct AdminKey;

impl FromRequestParts<AppState> for AdminKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        check_admin(&parts.headers, state.admin_key.as_deref())?;
        Ok(AdminKey)
    }
}

pub fn check_admin(headers: &HeaderMap, expected: Option<&SecretString>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Err(AppError::Forbidden(
            "system prompt administration is disabled".to_string(),
        ));
    };
    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing X-Admin-Key header".to_string()))?;
    if keys_match(expected.expose_secret(), provided.trim()) {
        Ok(())
    } else {
        Err(AppError::Forbidden("invalid admin key".to_string()))
    }
}
