//! HTTP/WebSocket API layer.
//!
//! Axum routes at `/api/v1/` with bearer-token authentication, the
//! `{data, meta, errors}` envelope and CORS.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
