//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `voice` - Incoming call webhook answering with TwiML
//! - `media_stream` - Telephony media stream WebSocket bridged to the realtime API

pub mod api;
pub mod media_stream;
pub mod voice;

pub use media_stream::media_stream_handler;
pub use voice::incoming_call;
