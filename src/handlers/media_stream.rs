//! Telephony media stream WebSocket handler
//!
//! Each accepted socket becomes one bridged call: a reader task feeds inbound
//! frames to the relay, a sender task writes the relay's frames back, and the
//! relay itself owns the realtime connection.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::bridge::{BridgeRelay, SessionNegotiator, TelephonyInput, TelephonyRoute};
use crate::state::AppState;

/// Channel buffer size for audio frames
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long to wait for the sender task to flush after the relay ends
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Media stream WebSocket handler
///
/// Upgrades the connection and bridges it to a new realtime session.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            let session_id = Uuid::new_v4();
            handle_media_stream(socket, state).instrument(info_span!("call", %session_id))
        })
}

async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    info!("Client connected");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<TelephonyRoute>(CHANNEL_BUFFER_SIZE);
    let (input_tx, input_rx) = mpsc::channel::<TelephonyInput>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let sender_task = tokio::spawn(
        async move {
            while let Some(route) = route_rx.recv().await {
                let frame = match route {
                    TelephonyRoute::Frame(frame) => frame,
                    TelephonyRoute::Close => {
                        info!("Closing telephony WebSocket");
                        break;
                    }
                };

                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize telephony frame: {}", e);
                        continue;
                    }
                };

                if let Err(e) = sender.send(Message::Text(json.into())).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }

            if let Err(e) = sender.close().await {
                debug!("Telephony WebSocket already closed: {}", e);
            }
        }
        .in_current_span(),
    );

    // Reader task for incoming frames
    let reader_task = tokio::spawn(
        async move {
            while let Some(message) = receiver.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let frame = TelephonyInput::Frame(text.as_str().to_owned());
                        if input_tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Telephony WebSocket error: {}", e);
                        break;
                    }
                }
            }
            let _ = input_tx.send(TelephonyInput::Closed).await;
        }
        .in_current_span(),
    );

    match state.realtime_factory.create() {
        Ok(realtime) => {
            let negotiator = SessionNegotiator::new(
                state.negotiation_settings(),
                state.config.negotiation_delay(),
            );
            let relay = BridgeRelay::new(
                realtime,
                negotiator,
                state.tools.clone(),
                route_tx,
                state.relay_policy(),
            );
            relay.run(input_rx).await;
        }
        Err(e) => {
            error!("Failed to create realtime connection: {}", e);
            let _ = route_tx.send(TelephonyRoute::Close).await;
        }
    }

    reader_task.abort();
    if timeout(SENDER_DRAIN_TIMEOUT, sender_task).await.is_err() {
        warn!("Telephony sender did not finish in time");
    }

    info!("Media stream connection closed");
}
