//! Shared helpers for integration tests

use callbridge::ServerConfig;
use callbridge::config::{DEFAULT_GREETING, DEFAULT_GREETING_PROMPT, default_forwarding_directory};

/// Minimal configuration pointing the realtime client at `realtime_url`.
pub fn test_config(realtime_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 5050,
        tls: None,
        openai_api_key: "sk-test".to_string(),
        openai_realtime_url: realtime_url.to_string(),
        openai_model: "gpt-4o-mini-realtime-preview-2024-12-17".to_string(),
        openai_voice: "alloy".to_string(),
        openai_temperature: 0.8,
        transcribe_caller: false,
        instructions: None,
        greet_first: false,
        negotiation_delay_ms: 10,
        upstream_connect_timeout_seconds: 5,
        max_session_duration_seconds: 60,
        close_call_on_upstream_loss: true,
        lead_intake_url: None,
        lead_intake_api_key: None,
        forwarding_directory: default_forwarding_directory(),
        twilio_account_sid: None,
        twilio_auth_token: None,
        twilio_api_base_url: "https://api.twilio.com".to_string(),
        greeting: DEFAULT_GREETING.to_string(),
        greeting_prompt: DEFAULT_GREETING_PROMPT.to_string(),
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
    }
}
