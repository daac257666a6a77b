//! OpenAI Realtime API module.
//!
//! Speech-to-speech conversation over the OpenAI Realtime WebSocket protocol.
//!
//! # Audio Format
//!
//! Telephony calls use G.711 u-law at 8kHz in both directions, so caller audio
//! is forwarded without transcoding.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge::core::realtime::{BaseRealtime, OpenAIRealtime, RealtimeConfig};
//!
//! let mut realtime = OpenAIRealtime::new(RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     model: "gpt-4o-mini-realtime-preview-2024-12-17".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let mut events = realtime.connect().await?;
//! realtime.send_event(ClientEvent::audio_append(payload)).await?;
//! while let Some(event) = events.recv().await {
//!     // ...
//! }
//! ```

mod client;
mod config;
pub mod messages;

pub use client::{OpenAIRealtime, OpenAIRealtimeFactory};
pub use config::{
    G711_ULAW_FORMAT, Modality, OPENAI_BETA_HEADER, OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
};
pub use messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, ServerEvent, SessionConfig, ToolDef,
    TurnDetection,
};
