//! Route tables
//!
//! - `api` - Health check and the incoming call webhook
//! - `media_stream` - Telephony media stream WebSocket

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod api;
pub mod media_stream;

/// Build the full router with state applied.
///
/// Server-wide layers (CORS, rate limiting, security headers) are added by
/// the binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(media_stream::create_media_stream_router())
        .with_state(state)
}
