//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream::media_stream_handler;
use crate::handlers::voice::MEDIA_STREAM_PATH;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream WebSocket router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for a Twilio Media Stream
///
/// # Protocol
///
/// Twilio sends `connected`, `start`, `media`, `mark` and `stop` events as
/// JSON text frames. The server answers with `media`, `mark` and `clear`
/// events carrying the stream SID it learned from `start`.
///
/// ```json
/// // Twilio sends caller audio (base64 G.711 u-law, 8 kHz)
/// {"event": "media", "media": {"payload": "...", "timestamp": "120"}}
///
/// // Server plays assistant audio, then marks the end of the chunk
/// {"event": "media", "streamSid": "MZ...", "media": {"payload": "..."}}
/// {"event": "mark", "streamSid": "MZ...", "mark": {"name": "responsePart-1"}}
/// ```
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
