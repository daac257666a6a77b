use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///
/// openai:
///   api_key: "sk-..."
///   model: "gpt-4o-mini-realtime-preview-2024-12-17"
///   voice: "alloy"
///   temperature: 0.8
///
/// bridge:
///   greet_first: false
///   negotiation_delay_ms: 100
///   close_call_on_upstream_loss: true
///
/// leads:
///   url: "https://leads.example.com/intake"
///   api_key: "workflow-key"
///
/// forwarding:
///   directory:
///     Saurabh: "7063043893"
///
/// twilio:
///   account_sid: "AC..."
///   auth_token: "..."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub bridge: Option<BridgeYaml>,
    pub leads: Option<LeadsYaml>,
    pub forwarding: Option<ForwardingYaml>,
    pub twilio: Option<TwilioYaml>,
    pub voice: Option<VoiceYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// OpenAI Realtime settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub temperature: Option<f32>,
    pub transcribe_caller: Option<bool>,
    pub instructions: Option<String>,
}

/// Per-call bridge behavior from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub greet_first: Option<bool>,
    pub negotiation_delay_ms: Option<u64>,
    pub upstream_connect_timeout_seconds: Option<u64>,
    pub max_session_duration_seconds: Option<u64>,
    pub close_call_on_upstream_loss: Option<bool>,
}

/// Lead intake collaborator from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LeadsYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// Call forwarding directory from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ForwardingYaml {
    pub directory: Option<BTreeMap<String, String>>,
}

/// Twilio REST credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_base_url: Option<String>,
}

/// Call-routing speech from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoiceYaml {
    pub greeting: Option<String>,
    pub prompt: Option<String>,
}

/// Security configuration from YAML
///
/// # Example YAML structure
/// ```yaml
/// security:
///   cors_allowed_origins: "https://example.com,https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
