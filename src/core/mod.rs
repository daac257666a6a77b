pub mod bridge;
pub mod realtime;
pub mod telephony;
pub mod tools;

pub use bridge::{BridgeRelay, BridgeSession, RelayOutcome};
pub use realtime::{BaseRealtime, BoxedRealtime, RealtimeConfig, RealtimeError, RealtimeFactory};
pub use tools::ToolHandler;
