//! Incoming call webhook.
//!
//! Twilio requests this URL when a call arrives. The response greets the
//! caller and connects the call to the media stream endpoint on this host.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::info;

use crate::core::telephony::incoming_call_twiml;
use crate::state::AppState;

/// Path of the media stream WebSocket.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// Answer an incoming call with TwiML.
///
/// The stream URL uses the request's `Host` header. It is `wss` unless a
/// proxy reports `X-Forwarded-Proto: http`.
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.address());

    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
    {
        Some(proto) if proto.eq_ignore_ascii_case("http") => "ws",
        _ => "wss",
    };

    let stream_url = format!("{scheme}://{host}{MEDIA_STREAM_PATH}");
    info!(%stream_url, "Answering incoming call");

    let body = incoming_call_twiml(
        &state.config.greeting,
        &state.config.greeting_prompt,
        &stream_url,
    );

    ([(header::CONTENT_TYPE, "text/xml")], body)
}
