//! Axum router configuration with middleware.
//!
//! All API routes are under `/api/v1/`; `/health` sits at the root. With
//! the filesystem storage backend, generated media is served from `/blobs`.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use avazon_types::config::StorageBackend;

use crate::http::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Creation sessions
        .route("/avatar/create/new", post(handlers::creation::start_creation))
        .route(
            "/avatar/create/{id}",
            get(handlers::creation::get_creation).post(handlers::creation::publish_avatar),
        )
        .route("/avatar/create/{id}/image", post(handlers::creation::create_image))
        .route("/avatar/create/{id}/character", post(handlers::creation::create_character))
        .route("/avatar/create/{id}/voice", post(handlers::creation::create_voice))
        .route("/avatar/create/{id}/enter", get(handlers::ws::enter_session))
        // Catalogue
        .route("/avatar", get(handlers::catalog::list_avatars))
        .route("/avatar/{id}", get(handlers::catalog::get_avatar))
        .route("/avatar/contents/{kind}", get(handlers::catalog::list_contents))
        .route("/avatar/contents/{kind}/{id}", get(handlers::catalog::get_content))
        // Music
        .route(
            "/avatar/{id}/contents/create/music",
            post(handlers::music::start_music),
        )
        .route("/contents/creations/music", get(handlers::music::list_music))
        .route("/contents/creations/music/{id}", get(handlers::music::get_music))
        .route(
            "/contents/creations/music/{id}/regenerate-image",
            post(handlers::music::regenerate_image),
        )
        .route(
            "/contents/creations/music/{id}/confirm",
            post(handlers::music::confirm_music),
        )
        // Video
        .route(
            "/avatar/{id}/contents/create/video/image",
            post(handlers::video::start_image),
        )
        .route("/contents/creations/video", get(handlers::video::list_videos))
        .route("/contents/creations/video/{id}", get(handlers::video::get_video))
        .route(
            "/contents/creations/video/{id}/create",
            post(handlers::video::create_video),
        )
        .route(
            "/contents/creations/video/{id}/confirm",
            post(handlers::video::confirm_video),
        )
        // Remix
        .route("/avatar/{id}/remix", post(handlers::remix::start_remix))
        .route("/remix", get(handlers::remix::list_remixes))
        .route("/remix/{id}", get(handlers::remix::get_remix))
        .route("/remix/{id}/confirm", post(handlers::remix::confirm_remix))
        // System prompts (admin)
        .route("/system-prompts", get(handlers::prompt::list_prompts))
        .route(
            "/system-prompts/{id}",
            post(handlers::prompt::upsert_prompt).delete(handlers::prompt::delete_prompt),
        )
        .route("/system-prompts/usages", get(handlers::prompt::list_usages))
        .route(
            "/system-prompts/usages/{agent}",
            axum::routing::delete(handlers::prompt::delete_usage),
        )
        .route(
            "/system-prompts/usages/{agent}/use/{prompt_id}",
            post(handlers::prompt::set_usage),
        );

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check));

    if state.config.storage.backend == StorageBackend::Filesystem {
        let blob_dir = state.data_dir.join(&state.config.storage.blob_dir);
        tracing::info!(path = %blob_dir.display(), "serving blobs from disk");
        router = router.nest_service("/blobs", ServeDir::new(blob_dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health (no auth)
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
