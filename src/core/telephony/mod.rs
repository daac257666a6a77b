//! Telephony side of the bridge: Twilio Media Streams frames and TwiML.
//!
//! Media payloads are base64 G.711 u-law and are never decoded here; the
//! bridge passes them through to the realtime peer as-is.

mod messages;
mod twiml;

pub use messages::{
    MarkPayload, MediaPayload, OutboundMedia, StartMetadata, TelephonyError, TwilioInbound,
    TwilioOutbound,
};
pub use twiml::{TwimlVerb, dial_twiml, incoming_call_twiml, render_twiml};
