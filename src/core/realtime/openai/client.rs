//! OpenAI Realtime API WebSocket client.
//!
//! One client owns one upstream connection. A spawned connection task owns
//! the socket: it drains the command channel into the sink and decodes
//! inbound text frames into [`RealtimeEvent`]s for the bridge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::OPENAI_BETA_HEADER;
use super::messages::{ClientEvent, LOGGED_EVENT_TYPES, ServerEvent};
use crate::core::realtime::base::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeFactory, RealtimeResult,
};

/// Channel capacity for outgoing client events
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for decoded server events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `disconnect` waits for the close frame to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

enum Command {
    Send(ClientEvent),
    Close,
}

/// OpenAI Realtime API client.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    endpoint: Url,
    command_tx: Option<mpsc::Sender<Command>>,
    connection_handle: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    lost: Arc<AtomicBool>,
}

impl OpenAIRealtime {
    /// Validate the configuration and build a disconnected client.
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let mut endpoint = Url::parse(&config.url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid URL: {e}")))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "Unsupported URL scheme: {}",
                endpoint.scheme()
            )));
        }
        if !config.model.is_empty() {
            endpoint.query_pairs_mut().append_pair("model", &config.model);
        }

        Ok(Self {
            config,
            endpoint,
            command_tx: None,
            connection_handle: None,
            connected: Arc::new(AtomicBool::new(false)),
            lost: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Full endpoint including the model query parameter.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn fail(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.lost.store(true, Ordering::SeqCst);
    }
}

/// Decode one inbound text frame, echoing allow-listed types to the log.
fn decode_server_event(text: &str) -> Option<ServerEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse server event: {} - {}", e, text);
            return None;
        }
    };

    let event_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if LOGGED_EVENT_TYPES.contains(&event_type) {
        info!(event_type, event = %value, "Received realtime event");
    }

    match serde_json::from_value::<ServerEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to decode server event: {}", e);
            None
        }
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<RealtimeEvent>> {
        if self.is_ready() {
            return Err(RealtimeError::InvalidConfiguration(
                "Already connected".to_string(),
            ));
        }
        self.lost.store(false, Ordering::SeqCst);

        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| {
                RealtimeError::InvalidConfiguration("API key is not a valid header".to_string())
            })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static(OPENAI_BETA_HEADER));

        let connecting = tokio_tungstenite::connect_async(request);
        let (ws_stream, _response) =
            match tokio::time::timeout(self.config.connect_timeout, connecting).await {
                Ok(Ok(connection)) => connection,
                Ok(Err(tokio_tungstenite::tungstenite::Error::Http(response)))
                    if response.status() == StatusCode::UNAUTHORIZED =>
                {
                    self.fail();
                    return Err(RealtimeError::AuthenticationFailed(
                        "Upstream rejected the API key".to_string(),
                    ));
                }
                Ok(Err(e)) => {
                    self.fail();
                    return Err(RealtimeError::ConnectionFailed(e.to_string()));
                }
                Err(_) => {
                    self.fail();
                    return Err(RealtimeError::Timeout(format!(
                        "handshake exceeded {:?}",
                        self.config.connect_timeout
                    )));
                }
            };

        info!("Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (command_tx, mut command_rx) = mpsc::channel::<Command>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RealtimeEvent>(EVENT_CHANNEL_CAPACITY);

        let connected = self.connected.clone();
        let lost = self.lost.clone();
        connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let mut close_reason: Option<String> = None;
            let mut intentional = false;

            loop {
                tokio::select! {
                    command = command_rx.recv() => match command {
                        Some(Command::Send(event)) => {
                            let json = match serde_json::to_string(&event) {
                                Ok(j) => j,
                                Err(e) => {
                                    error!("Failed to serialize event: {}", e);
                                    continue;
                                }
                            };

                            if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                error!("Failed to send WebSocket message: {}", e);
                                close_reason = Some(e.to_string());
                                break;
                            }
                        }
                        Some(Command::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "call ended".into(),
                            };
                            if let Err(e) = ws_sink.send(Message::Close(Some(frame))).await {
                                debug!("Close frame not delivered: {}", e);
                            }
                            intentional = true;
                            break;
                        }
                    },

                    message = ws_stream.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = decode_server_event(&text)
                                && event_tx.send(RealtimeEvent::Server(event)).await.is_err()
                            {
                                debug!("Realtime event receiver dropped");
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                error!("Failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed by server");
                            close_reason = frame.map(|f| f.reason.as_str().to_string());
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            close_reason = Some(e.to_string());
                            break;
                        }
                        None => {
                            close_reason = Some("stream ended".to_string());
                            break;
                        }
                    },
                }
            }

            connected.store(false, Ordering::SeqCst);
            if !intentional {
                lost.store(true, Ordering::SeqCst);
                let _ = event_tx
                    .send(RealtimeEvent::Closed {
                        reason: close_reason,
                    })
                    .await;
            }
            info!("OpenAI Realtime connection task ended");
        });

        self.command_tx = Some(command_tx);
        self.connection_handle = Some(handle);

        Ok(event_rx)
    }

    async fn send_event(&mut self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.command_tx.as_ref().ok_or(RealtimeError::NotConnected)?;
        sender
            .send(Command::Send(event))
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        if let Some(sender) = self.command_tx.take() {
            let _ = sender.send(Command::Close).await;
        }

        if let Some(mut handle) = self.connection_handle.take()
            && tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err()
        {
            warn!("Realtime connection task did not stop in time, aborting");
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_connection_state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else if self.lost.load(Ordering::SeqCst) {
            ConnectionState::Failed
        } else {
            ConnectionState::Disconnected
        }
    }
}

/// Builds an [`OpenAIRealtime`] client per call from shared settings.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeFactory {
    config: RealtimeConfig,
}

impl OpenAIRealtimeFactory {
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        // Fail at startup rather than on the first call.
        OpenAIRealtime::new(config.clone())?;
        Ok(Self { config })
    }
}

impl RealtimeFactory for OpenAIRealtimeFactory {
    fn create(&self) -> RealtimeResult<BoxedRealtime> {
        Ok(Box::new(OpenAIRealtime::new(self.config.clone())?))
    }
}

// =============================================================================
// Tests
// =============================================================================
