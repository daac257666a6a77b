//! Base traits and types for the upstream realtime connection.
//!
//! A bridge session talks to exactly one realtime peer through [`BaseRealtime`].
//! The peer is connected once, yields its inbound traffic as a stream of
//! [`RealtimeEvent`]s on an mpsc channel, and accepts outbound [`ClientEvent`]s
//! until it is disconnected. There is no reconnection: a lost upstream ends the
//! conversation.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use super::openai::messages::{ClientEvent, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Connection settings for a realtime provider.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,
    /// Base WebSocket endpoint, without query string
    pub url: String,
    /// Model to use (e.g., "gpt-4o-mini-realtime-preview-2024-12-17")
    pub model: String,
    /// Bound on the WebSocket handshake
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: super::openai::OPENAI_REALTIME_URL.to_string(),
            model: String::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Connected and ready
    Connected,
    /// Connection failed or was lost
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// Inbound traffic from the realtime peer.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// A decoded server event
    Server(ServerEvent),
    /// The peer closed the connection or the transport failed
    Closed {
        /// Close reason or transport error, if any
        reason: Option<String>,
    },
}

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for the upstream realtime connection.
///
/// `connect` hands back the receiving half of the inbound event channel. The
/// channel yields a single `Closed` event when the connection ends for any
/// reason other than `disconnect`, and is closed afterwards.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Open the connection and start the connection task.
    async fn connect(&mut self) -> RealtimeResult<mpsc::Receiver<RealtimeEvent>>;

    /// Queue an event for sending.
    async fn send_event(&mut self, event: ClientEvent) -> RealtimeResult<()>;

    /// Close the connection with a normal close frame.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    /// True while the connection can accept events.
    fn is_ready(&self) -> bool;

    /// Connection state, reported when the session ends.
    fn get_connection_state(&self) -> ConnectionState;
}

/// Boxed realtime connection used by the bridge.
pub type BoxedRealtime = Box<dyn BaseRealtime>;

/// Creates one realtime connection per bridged call.
pub trait RealtimeFactory: Send + Sync {
    fn create(&self) -> RealtimeResult<BoxedRealtime>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Failed.to_string(), "Failed");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(RealtimeError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            RealtimeError::Timeout("handshake".to_string()).to_string(),
            "Operation timed out: handshake"
        );
    }

    #[test]
    fn test_default_config_points_at_openai() {
        let config = RealtimeConfig::default();
        assert!(config.url.starts_with("wss://api.openai.com"));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
