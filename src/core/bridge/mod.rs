//! The call bridge.
//!
//! Relays audio between a telephony media stream and a realtime model while
//! keeping track of what the caller has actually heard, so that barge-in can
//! cut the model's reply at the right offset.
//!
//! - [`tracker`]: caller media clock and response start offset
//! - [`marks`]: playback acknowledgment queue
//! - [`interruption`]: barge-in truncation
//! - [`negotiator`]: delayed `session.update`
//! - [`session`]: pure per-call state machine
//! - [`relay`]: the task that owns both peers

pub mod interruption;
pub mod marks;
pub mod negotiator;
pub mod relay;
pub mod session;
pub mod tracker;

pub use marks::MarkQueue;
pub use negotiator::{NegotiationSettings, SessionNegotiator};
pub use relay::{BridgeRelay, RelayOutcome, RelayPolicy, TelephonyInput, TelephonyRoute};
pub use session::{BridgeAction, BridgeSession};
pub use tracker::TimestampTracker;
