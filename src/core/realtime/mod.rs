//! Upstream realtime conversation module.
//!
//! A bridged call holds one [`BaseRealtime`] connection for its whole life.
//! The connection delivers decoded server events on a channel and accepts
//! client events until it is closed.
//!
//! # Supported Providers
//!
//! - **OpenAI Realtime API** - full duplex audio with function calling

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeFactory, RealtimeResult,
};
pub use openai::{
    ClientEvent, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeFactory, ServerEvent,
};
