use axum::{routing::get, Router};
use std::sync::Arc;

use super::gate::RedirectGate;
use super::handlers::{redirect, RedirectState};

pub fn create_redirect_router(gate: RedirectGate) -> Router {
    let state = Arc::new(RedirectState { gate });

    Router::new()
        .route("/{code}", get(redirect))
        .with_state(state)
}
