use axum::{
    Router,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, voice};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP router
///
/// `/incoming-call` accepts any method since Twilio may be configured to
/// call the webhook with either GET or POST.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/incoming-call", any(voice::incoming_call))
        .layer(TraceLayer::new_for_http())
}
