use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{
    create_link, delete_link, get_stats, health_check, list_links, update_link, AppState,
};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/links",
            post(create_link)
                .get(list_links)
                .put(update_link)
                .delete(delete_link),
        )
        .route("/stats", get(get_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
