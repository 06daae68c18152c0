//! The HTTP surface: `/chat` is the only wire boundary clients talk to.

pub mod chat;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the full API router. `GET /chat` returns health/status JSON,
/// `POST /chat` streams the Agent Loop's output as SSE.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", get(chat::status).post(chat::chat))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
