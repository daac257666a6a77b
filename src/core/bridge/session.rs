//! Per-call bridge state machine.
//!
//! [`BridgeSession`] consumes one telephony frame or realtime event at a time
//! and returns the [`BridgeAction`]s the relay should perform. It does no I/O,
//! which keeps every protocol decision testable without sockets.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use super::interruption;
use super::marks::MarkQueue;
use super::tracker::TimestampTracker;
use crate::core::realtime::openai::{ClientEvent, ServerEvent};
use crate::core::telephony::{TwilioInbound, TwilioOutbound};
use crate::core::tools::ToolInvocation;

/// Work the relay performs on behalf of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    /// Send a frame to the caller side
    ToTelephony(TwilioOutbound),
    /// Send an event to the realtime peer
    ToRealtime(ClientEvent),
    /// Run a completed function call
    InvokeTool(ToolInvocation),
    /// Close the realtime connection
    CloseRealtime,
    /// Close the telephony socket
    CloseTelephony,
    /// Stop the relay loop
    Terminate,
}

/// State for one bridged call.
#[derive(Debug, Default)]
pub struct BridgeSession {
    stream_sid: Option<String>,
    call_sid: Option<String>,
    tracker: TimestampTracker,
    marks: MarkQueue,
    last_assistant_item: Option<String>,
    /// call_id -> function name, from `response.output_item.added`
    pending_calls: HashMap<String, String>,
    transcript: Vec<String>,
    upstream_open: bool,
}

impl BridgeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The realtime connection is up; caller audio may flow.
    pub fn on_realtime_ready(&mut self) {
        self.upstream_open = true;
    }

    pub fn on_telephony_frame(&mut self, text: &str) -> Vec<BridgeAction> {
        let frame = match TwilioInbound::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping telephony frame");
                return Vec::new();
            }
        };

        match frame {
            TwilioInbound::Start { start } => {
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = ?start.call_sid,
                    "Incoming stream has started"
                );
                self.stream_sid = Some(start.stream_sid);
                self.call_sid = start.call_sid;
                self.tracker.reset();
                self.tracker.reset_clock();
                Vec::new()
            }
            TwilioInbound::Media { media } => {
                self.tracker.on_media(media.timestamp);
                if self.upstream_open {
                    vec![BridgeAction::ToRealtime(ClientEvent::audio_append(
                        media.payload,
                    ))]
                } else {
                    Vec::new()
                }
            }
            TwilioInbound::Mark { mark } => {
                self.marks.acknowledge(&mark.name);
                Vec::new()
            }
            TwilioInbound::Connected => {
                debug!("Telephony stream connected");
                Vec::new()
            }
            TwilioInbound::Stop => {
                info!(stream_sid = ?self.stream_sid, "Telephony stream stopped");
                Vec::new()
            }
            TwilioInbound::Other => {
                debug!("Ignoring telephony event");
                Vec::new()
            }
        }
    }

    /// The caller hung up or the socket dropped.
    pub fn on_telephony_closed(&mut self) -> Vec<BridgeAction> {
        info!(stream_sid = ?self.stream_sid, "Client disconnected");
        if self.upstream_open {
            self.upstream_open = false;
            vec![BridgeAction::CloseRealtime, BridgeAction::Terminate]
        } else {
            vec![BridgeAction::Terminate]
        }
    }

    pub fn on_realtime_event(&mut self, event: ServerEvent) -> Vec<BridgeAction> {
        match event {
            ServerEvent::AudioDelta { item_id, delta, .. } if !delta.is_empty() => {
                self.on_audio_delta(item_id, delta)
            }
            ServerEvent::AudioDelta { .. } => Vec::new(),

            ServerEvent::SpeechStarted { .. } => self.on_speech_started(),

            ServerEvent::OutputItemAdded { item, .. } => {
                if item.item_type == "function_call"
                    && let (Some(call_id), Some(name)) = (item.call_id, item.name)
                {
                    debug!(%call_id, function = %name, "Function call started");
                    self.pending_calls.insert(call_id, name);
                }
                Vec::new()
            }

            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                ..
            } => {
                let pending = self.pending_calls.remove(&call_id);
                let Some(name) = name.or(pending) else {
                    warn!(%call_id, "Function call arguments for unknown call");
                    return Vec::new();
                };
                vec![BridgeAction::InvokeTool(ToolInvocation {
                    call_id,
                    name,
                    arguments,
                    call_sid: self.call_sid.clone(),
                    transcript: self.transcript_text(),
                })]
            }

            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                self.record("assistant", transcript);
                Vec::new()
            }

            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                self.record("user", transcript);
                Vec::new()
            }

            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    message = %error.message,
                    "Realtime API error"
                );
                Vec::new()
            }

            _ => Vec::new(),
        }
    }

    /// The realtime connection closed or failed.
    ///
    /// With `close_call` the caller is hung up; otherwise the call stays up in
    /// silence until the caller leaves.
    pub fn on_realtime_lost(
        &mut self,
        close_call: bool,
        reason: Option<String>,
    ) -> Vec<BridgeAction> {
        self.upstream_open = false;
        error!(
            stream_sid = ?self.stream_sid,
            reason = reason.as_deref().unwrap_or("none"),
            "Disconnected from the realtime API"
        );
        if close_call {
            vec![BridgeAction::CloseTelephony, BridgeAction::Terminate]
        } else {
            Vec::new()
        }
    }

    fn on_audio_delta(&mut self, item_id: Option<String>, delta: String) -> Vec<BridgeAction> {
        let mut actions = vec![BridgeAction::ToTelephony(TwilioOutbound::media(
            self.stream_sid.as_deref(),
            delta,
        ))];

        // A new item is a new segment; its playback starts now.
        if let Some(id) = &item_id
            && self.last_assistant_item.as_ref().is_some_and(|last| last != id)
        {
            self.tracker.reset();
        }
        self.tracker.on_response_audio_first_delta();
        if item_id.is_some() {
            self.last_assistant_item = item_id;
        }

        if let Some(stream_sid) = &self.stream_sid {
            let name = self.marks.next_name();
            self.marks.push(name.clone());
            actions.push(BridgeAction::ToTelephony(TwilioOutbound::mark(
                stream_sid, name,
            )));
        }

        actions
    }

    fn on_speech_started(&mut self) -> Vec<BridgeAction> {
        let Some(interruption) = interruption::on_speech_started(
            &mut self.tracker,
            &mut self.marks,
            &mut self.last_assistant_item,
        ) else {
            return Vec::new();
        };

        let mut actions = Vec::with_capacity(2);
        if let Some(point) = interruption.truncate {
            actions.push(BridgeAction::ToRealtime(ClientEvent::truncate(
                point.item_id,
                point.audio_end_ms,
            )));
        }
        actions.push(BridgeAction::ToTelephony(TwilioOutbound::clear(
            self.stream_sid.as_deref(),
        )));
        actions
    }

    fn record(&mut self, role: &str, text: String) {
        let text = text.trim();
        if !text.is_empty() {
            self.transcript.push(format!("{role}: {text}"));
        }
    }

    /// Conversation so far, one `role: text` line per turn.
    pub fn transcript_text(&self) -> String {
        self.transcript.join("\n")
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.call_sid.as_deref()
    }

    pub fn tracker(&self) -> &TimestampTracker {
        &self.tracker
    }

    pub fn marks(&self) -> &MarkQueue {
        &self.marks
    }

    pub fn last_assistant_item(&self) -> Option<&str> {
        self.last_assistant_item.as_deref()
    }

    pub fn is_upstream_open(&self) -> bool {
        self.upstream_open
    }
}
