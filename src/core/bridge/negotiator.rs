//! Session negotiation: the single `session.update` sent shortly after the
//! upstream connection opens.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ServerConfig;
use crate::core::realtime::openai::{
    ClientEvent, G711_ULAW_FORMAT, InputAudioTranscription, Modality, OpenAIRealtimeVoice,
    SessionConfig, ToolDef, TurnDetection,
};
use crate::core::tools::tool_definitions;

/// Model used for caller transcription when it is enabled.
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Message that prompts the assistant to open the conversation.
pub const GREET_FIRST_PROMPT: &str = "Greet the caller warmly, introduce yourself as a virtual \
customer advisor and ask how you can help them today.";

/// Everything that goes into the session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationSettings {
    pub voice: OpenAIRealtimeVoice,
    pub instructions: String,
    pub temperature: f32,
    pub tools: Vec<ToolDef>,
    pub transcribe_caller: bool,
    pub greet_first: bool,
}

impl NegotiationSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            voice: OpenAIRealtimeVoice::from_str_or_default(&config.openai_voice),
            instructions: config.assistant_instructions(),
            temperature: config.openai_temperature,
            tools: tool_definitions(),
            transcribe_caller: config.transcribe_caller,
            greet_first: config.greet_first,
        }
    }

    /// The `session` object of the update.
    pub fn session_config(&self) -> SessionConfig {
        let format = G711_ULAW_FORMAT.to_string();
        SessionConfig {
            modalities: Some(vec![
                Modality::Text.as_str().to_string(),
                Modality::Audio.as_str().to_string(),
            ]),
            instructions: Some(self.instructions.clone()),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some(format.clone()),
            output_audio_format: Some(format),
            input_audio_transcription: self.transcribe_caller.then(|| InputAudioTranscription {
                model: TRANSCRIPTION_MODEL.to_string(),
            }),
            turn_detection: Some(TurnDetection::server_vad()),
            tools: Some(self.tools.clone()),
            tool_choice: Some("auto".to_string()),
            temperature: Some(self.temperature),
        }
    }

    /// Events to send once the delay has passed.
    pub fn events(&self) -> Vec<ClientEvent> {
        let mut events = vec![ClientEvent::SessionUpdate {
            session: self.session_config(),
        }];
        if self.greet_first {
            events.push(ClientEvent::user_text(GREET_FIRST_PROMPT));
            events.push(ClientEvent::ResponseCreate);
        }
        events
    }
}

/// Fires the negotiation exactly once, a fixed delay after the upstream
/// connection is ready.
#[derive(Debug)]
pub struct SessionNegotiator {
    settings: NegotiationSettings,
    delay: Duration,
    deadline: Option<Instant>,
    sent: bool,
}

impl SessionNegotiator {
    pub fn new(settings: NegotiationSettings, delay: Duration) -> Self {
        Self {
            settings,
            delay,
            deadline: None,
            sent: false,
        }
    }

    /// Arm the timer from the moment the upstream became ready.
    pub fn schedule(&mut self, ready_at: Instant) {
        if !self.sent {
            self.deadline = Some(ready_at + self.delay);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the negotiation events if the deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<ClientEvent>> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.sent = true;
                Some(self.settings.events())
            }
            _ => None,
        }
    }

    /// Disarm without sending, e.g. when the upstream closed first.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> NegotiationSettings {
        NegotiationSettings::from_config(&crate::config::test_support::test_config())
    }

    #[test]
    fn test_session_config_defaults() {
        let value = serde_json::to_value(settings().session_config()).unwrap();
        assert_eq!(value["voice"], "alloy");
        assert_eq!(value["input_audio_format"], "g711_ulaw");
        assert_eq!(value["output_audio_format"], "g711_ulaw");
        assert_eq!(value["turn_detection"], json!({"type": "server_vad"}));
        assert_eq!(value["modalities"], json!(["text", "audio"]));
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"].as_array().unwrap().len(), 2);
        assert!(value.get("input_audio_transcription").is_none());
        assert!((value["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_transcription_when_enabled() {
        let mut settings = settings();
        settings.transcribe_caller = true;
        let config = settings.session_config();
        assert_eq!(
            config.input_audio_transcription,
            Some(InputAudioTranscription {
                model: "whisper-1".to_string()
            })
        );
    }

    #[test]
    fn test_greet_first_appends_response() {
        let mut settings = settings();
        assert_eq!(settings.events().len(), 1);

        settings.greet_first = true;
        let events = settings.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ClientEvent::SessionUpdate { .. }));
        assert!(matches!(events[1], ClientEvent::ConversationItemCreate { .. }));
        assert_eq!(events[2], ClientEvent::ResponseCreate);
    }

    #[test]
    fn test_fires_once_after_delay() {
        let mut negotiator = SessionNegotiator::new(settings(), Duration::from_millis(100));
        let ready = Instant::now();
        assert_eq!(negotiator.take_due(ready), None);

        negotiator.schedule(ready);
        assert_eq!(negotiator.deadline(), Some(ready + Duration::from_millis(100)));
        assert_eq!(negotiator.take_due(ready + Duration::from_millis(50)), None);

        let events = negotiator
            .take_due(ready + Duration::from_millis(100))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(negotiator.is_sent());
        assert_eq!(negotiator.deadline(), None);

        negotiator.schedule(ready);
        assert_eq!(negotiator.take_due(ready + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_cancel_suppresses_update() {
        let mut negotiator = SessionNegotiator::new(settings(), Duration::from_millis(100));
        let ready = Instant::now();
        negotiator.schedule(ready);
        negotiator.cancel();
        assert_eq!(negotiator.take_due(ready + Duration::from_secs(1)), None);
        assert!(!negotiator.is_sent());
    }
}
