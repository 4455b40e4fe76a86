// src/api/http/mod.rs
// HTTP router composition.

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::CONFIG;
use crate::state::AppState;

mod debates;
mod quality;

/// Build the application router. API routes are nested under `/api`.
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        // Debates
        .route("/debates", post(debates::create_debate).get(debates::list_debates))
        .route(
            "/debates/{id}",
            get(debates::get_debate).delete(debates::delete_debate),
        )
        .route("/debates/{id}/next-turn", get(debates::next_turn))
        .route("/debates/{id}/stop", post(debates::stop_debate))
        .route("/debates/{id}/pause", post(debates::pause_debate))
        .route("/debates/{id}/resume", post(debates::resume_debate))
        .route("/debates/{id}/summary", get(debates::debate_summary))
        // Conversation quality (read side)
        .route("/conversations/{id}/quality", get(quality::conversation_quality))
        .route(
            "/conversations/{id}/contradictions",
            get(quality::list_contradictions),
        )
        .route("/conversations/{id}/loops", get(quality::list_loops))
        .route(
            "/conversations/{id}/health-history",
            get(quality::health_history),
        )
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = CONFIG
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    }
}
