pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::crawl::handlers as admin;
use crate::selection::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Daily prompt
        .route(
            "/api/v1/prompt/today",
            get(handlers::handle_get_today).put(handlers::handle_update_today),
        )
        .route("/api/v1/prompt/select", post(handlers::handle_select))
        // Reads
        .route("/api/v1/prompts/history", get(handlers::handle_history))
        .route("/api/v1/prompts/all", get(handlers::handle_list_prompts))
        // Admin
        .route("/api/v1/admin/crawl", post(admin::handle_trigger_crawl))
        .route("/api/v1/admin/status", get(admin::handle_status))
        .with_state(state)
}
