//! Twilio Media Streams WebSocket frames.
//!
//! Inbound frames carry an `event` discriminator. Only `start`, `media` and
//! `mark` affect the bridge; everything else decodes to a variant that is
//! logged and ignored.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors decoding or encoding telephony frames.
#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("Malformed telephony frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

// =============================================================================
// Inbound
// =============================================================================

/// Frames received from the telephony provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioInbound {
    /// Socket handshake acknowledgment
    Connected,

    /// Stream metadata, sent once before any media
    Start { start: StartMetadata },

    /// One chunk of caller audio
    Media { media: MediaPayload },

    /// Playback acknowledgment for a mark we sent
    Mark { mark: MarkPayload },

    /// Stream ended
    Stop,

    /// `dtmf` and any future event types
    #[serde(other)]
    Other,
}

impl TwilioInbound {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, TelephonyError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartMetadata {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Base64 audio, forwarded verbatim
    pub payload: String,
    /// Milliseconds since the stream started
    #[serde(default, deserialize_with = "timestamp_ms")]
    pub timestamp: u64,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Twilio sends timestamps as numeric strings; tests and proxies send numbers.
fn timestamp_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(ms) => Ok(ms),
        Raw::Float(ms) if ms >= 0.0 => Ok(ms as u64),
        Raw::Float(ms) => Err(serde::de::Error::custom(format!(
            "negative timestamp: {ms}"
        ))),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp: {text:?}"))),
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Frames sent to the telephony provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioOutbound {
    /// Audio for the caller
    Media {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        media: OutboundMedia,
    },

    /// Ask to be told when everything queued so far has played
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },

    /// Discard audio queued for playback
    Clear {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl TwilioOutbound {
    pub fn media(stream_sid: Option<&str>, payload: impl Into<String>) -> Self {
        TwilioOutbound::Media {
            stream_sid: stream_sid.map(str::to_string),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn mark(stream_sid: &str, name: impl Into<String>) -> Self {
        TwilioOutbound::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkPayload { name: name.into() },
        }
    }

    pub fn clear(stream_sid: Option<&str>) -> Self {
        TwilioOutbound::Clear {
            stream_sid: stream_sid.map(str::to_string),
        }
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, TelephonyError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start() {
        let frame = r#"{"event":"start","sequenceNumber":"1","streamSid":"MZ1",
            "start":{"accountSid":"AC1","streamSid":"MZ1","callSid":"CA1",
                     "tracks":["inbound"],"mediaFormat":{"encoding":"audio/x-mulaw","sampleRate":8000,"channels":1}}}"#;
        match TwilioInbound::parse(frame).unwrap() {
            TwilioInbound::Start { start } => {
                assert_eq!(start.stream_sid, "MZ1");
                assert_eq!(start.call_sid.as_deref(), Some("CA1"));
            }
            other => panic!("Unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_media_timestamp_as_string_or_number() {
        let as_string = TwilioInbound::parse(
            r#"{"event":"media","media":{"track":"inbound","chunk":"2","timestamp":"100","payload":"AAAA"}}"#,
        )
        .unwrap();
        let as_number =
            TwilioInbound::parse(r#"{"event":"media","media":{"timestamp":100,"payload":"AAAA"}}"#)
                .unwrap();
        for frame in [as_string, as_number] {
            match frame {
                TwilioInbound::Media { media } => {
                    assert_eq!(media.timestamp, 100);
                    assert_eq!(media.payload, "AAAA");
                }
                other => panic!("Unexpected frame: {other:?}"),
            }
        }
    }

    #[test]
    fn test_media_timestamp_missing_defaults_to_zero() {
        match TwilioInbound::parse(r#"{"event":"media","media":{"payload":"AAAA"}}"#).unwrap() {
            TwilioInbound::Media { media } => assert_eq!(media.timestamp, 0),
            other => panic!("Unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_media_timestamp_garbage_is_an_error() {
        assert!(
            TwilioInbound::parse(r#"{"event":"media","media":{"timestamp":"soon","payload":"A"}}"#)
                .is_err()
        );
    }

    #[test]
    fn test_other_events() {
        assert_eq!(
            TwilioInbound::parse(r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#)
                .unwrap(),
            TwilioInbound::Connected
        );
        assert_eq!(
            TwilioInbound::parse(r#"{"event":"stop","streamSid":"MZ1","stop":{}}"#).unwrap(),
            TwilioInbound::Stop
        );
        assert_eq!(
            TwilioInbound::parse(r#"{"event":"dtmf","dtmf":{"digit":"1"}}"#).unwrap(),
            TwilioInbound::Other
        );
        assert!(TwilioInbound::parse("not json").is_err());
    }

    #[test]
    fn test_outbound_frames() {
        let media = serde_json::to_value(TwilioOutbound::media(Some("abc"), "AAAA")).unwrap();
        assert_eq!(
            media,
            json!({"event": "media", "streamSid": "abc", "media": {"payload": "AAAA"}})
        );

        let mark = serde_json::to_value(TwilioOutbound::mark("abc", "responsePart-1")).unwrap();
        assert_eq!(
            mark,
            json!({"event": "mark", "streamSid": "abc", "mark": {"name": "responsePart-1"}})
        );

        let clear = TwilioOutbound::clear(Some("abc")).to_json().unwrap();
        assert_eq!(clear, r#"{"event":"clear","streamSid":"abc"}"#);
    }
}
