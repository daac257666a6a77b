//! Configuration module for the call bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//! - `persona`: Static assistant persona catalog and system prompt
//!
//! # Example
//! ```rust,no_run
//! use callbridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

mod merge;
pub mod persona;
mod utils;
mod validation;
mod yaml;

pub use persona::{Offering, system_instructions};

/// Default listening port for the bridge.
pub const DEFAULT_PORT: u16 = 5050;

/// Default realtime model used when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-mini-realtime-preview-2024-12-17";

/// Spoken before the caller is connected to the assistant.
pub const DEFAULT_GREETING: &str =
    "Welcome to The Generative AI Company. I am a virtual customer advisor.";

/// Spoken after the greeting pause.
pub const DEFAULT_GREETING_PROMPT: &str = "How can I help you today?";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge, including:
/// - Server settings (host, port, TLS)
/// - OpenAI Realtime credentials and session defaults
/// - Bridge lifetime and teardown policy
/// - Lead intake and call forwarding collaborators
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // OpenAI Realtime settings
    /// API key for the realtime endpoint. Startup fails without it.
    pub openai_api_key: String,
    /// Base WebSocket URL, the model is appended as a query parameter
    pub openai_realtime_url: String,
    pub openai_model: String,
    pub openai_voice: String,
    pub openai_temperature: f32,
    /// Ask the upstream service to transcribe caller audio (whisper-1)
    pub transcribe_caller: bool,
    /// Overrides the built-in persona prompt when set
    pub instructions: Option<String>,

    // Bridge behavior
    /// Have the assistant speak first once the session is negotiated
    pub greet_first: bool,
    pub negotiation_delay_ms: u64,
    pub upstream_connect_timeout_seconds: u64,
    pub max_session_duration_seconds: u64,
    /// Hang up the telephony leg when the upstream connection drops
    pub close_call_on_upstream_loss: bool,

    // Lead intake collaborator
    pub lead_intake_url: Option<String>,
    pub lead_intake_api_key: Option<String>,

    // Call forwarding
    /// Person name -> destination number, matched case-sensitively
    pub forwarding_directory: BTreeMap<String, String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_base_url: String,

    // Call-routing response text
    pub greeting: String,
    pub greeting_prompt: String,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
/// This ensures sensitive data is cleared from memory immediately after use.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.openai_api_key.zeroize();
        if let Some(ref mut key) = self.lead_intake_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs before this is called, so its values are
    /// visible here as ordinary environment variables.
    ///
    /// # Errors
    /// Returns an error if:
    /// - `OPENAI_API_KEY` is missing or empty
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if live call transfer through the Twilio REST API is possible
    pub fn has_call_control(&self) -> bool {
        self.twilio_account_sid.is_some() && self.twilio_auth_token.is_some()
    }

    /// System prompt sent to the assistant
    pub fn assistant_instructions(&self) -> String {
        self.instructions
            .clone()
            .unwrap_or_else(persona::system_instructions)
    }

    pub fn negotiation_delay(&self) -> Duration {
        Duration::from_millis(self.negotiation_delay_ms)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_seconds)
    }

    pub fn max_session_duration(&self) -> Duration {
        Duration::from_secs(self.max_session_duration_seconds)
    }
}

/// Built-in forwarding directory used when none is configured.
pub fn default_forwarding_directory() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Saurabh".to_string(), "7063043893".to_string()),
        ("Rakesh".to_string(), "6785221190".to_string()),
    ])
}

pub(crate) fn parse_forwarding_directory_json(
    json_str: &str,
) -> Result<BTreeMap<String, String>, Box<dyn std::error::Error>> {
    let directory: BTreeMap<String, String> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid FORWARDING_DIRECTORY_JSON format: {e}"))?;
    Ok(directory)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Helper function to create a test ServerConfig with defaults
    pub fn test_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            openai_api_key: "sk-test".to_string(),
            openai_realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            openai_model: DEFAULT_REALTIME_MODEL.to_string(),
            openai_voice: "alloy".to_string(),
            openai_temperature: 0.8,
            transcribe_caller: false,
            instructions: None,
            greet_first: false,
            negotiation_delay_ms: 100,
            upstream_connect_timeout_seconds: 10,
            max_session_duration_seconds: 3600,
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
}

#[cfg(test)]
mod tests {
    use super::test_support::test_config;
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_URL",
        "OPENAI_REALTIME_MODEL",
        "OPENAI_VOICE",
        "OPENAI_TEMPERATURE",
        "LEAD_INTAKE_URL",
        "LEAD_INTAKE_API_KEY",
        "FORWARDING_DIRECTORY_JSON",
        "CLOSE_CALL_ON_UPSTREAM_LOSS",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
    ];

    fn cleanup_env_vars() {
        for var in ENV_VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_address_and_tls_flags() {
        let mut config = test_config();
        assert_eq!(config.address(), "localhost:5050");
        assert!(!config.is_tls_enabled());

        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/tmp/cert.pem"),
            key_path: PathBuf::from("/tmp/key.pem"),
        });
        assert!(config.is_tls_enabled());
    }

    #[test]
    fn test_call_control_requires_both_credentials() {
        let mut config = test_config();
        assert!(!config.has_call_control());

        config.twilio_account_sid = Some("AC123".to_string());
        assert!(!config.has_call_control());

        config.twilio_auth_token = Some("token".to_string());
        assert!(config.has_call_control());
    }

    #[test]
    fn test_assistant_instructions_default_and_override() {
        let mut config = test_config();
        assert!(
            config
                .assistant_instructions()
                .contains("The Generative AI Company")
        );

        config.instructions = Some("Be brief.".to_string());
        assert_eq!(config.assistant_instructions(), "Be brief.");
    }

    #[test]
    fn test_durations() {
        let config = test_config();
        assert_eq!(config.negotiation_delay(), Duration::from_millis(100));
        assert_eq!(config.upstream_connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_session_duration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_forwarding_directory_json() {
        let directory = parse_forwarding_directory_json(r#"{"Ada": "5550001"}"#).unwrap();
        assert_eq!(directory.get("Ada").map(String::as_str), Some("5550001"));

        assert!(parse_forwarding_directory_json("[1, 2]").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_requires_openai_key() {
        cleanup_env_vars();

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("OPENAI_API_KEY"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
        }

        let config = ServerConfig::from_env().expect("Should load config");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5050);
        assert_eq!(config.openai_api_key, "sk-env");
        assert_eq!(config.openai_model, DEFAULT_REALTIME_MODEL);
        assert_eq!(config.openai_voice, "alloy");
        assert_eq!(config.openai_temperature, 0.8);
        assert!(config.close_call_on_upstream_loss);
        assert_eq!(config.forwarding_directory, default_forwarding_directory());
        assert!(config.lead_intake_url.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PORT", "8080");
            env::set_var("OPENAI_VOICE", "shimmer");
            env::set_var("CLOSE_CALL_ON_UPSTREAM_LOSS", "false");
            env::set_var("FORWARDING_DIRECTORY_JSON", r#"{"Grace": "5550002"}"#);
            env::set_var("LEAD_INTAKE_URL", "https://leads.example.com/intake");
        }

        let config = ServerConfig::from_env().expect("Should load config");
        assert_eq!(config.port, 8080);
        assert_eq!(config.openai_voice, "shimmer");
        assert!(!config.close_call_on_upstream_loss);
        assert_eq!(config.forwarding_directory.len(), 1);
        assert_eq!(
            config.lead_intake_url.as_deref(),
            Some("https://leads.example.com/intake")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PORT", "7000");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  port: 9000
openai:
  voice: "verse"
  temperature: 1.0
bridge:
  greet_first: true
  negotiation_delay_ms: 250
forwarding:
  directory:
    Linus: "5550003"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).expect("Should load config");
        assert_eq!(config.port, 9000);
        assert_eq!(config.openai_api_key, "sk-env");
        assert_eq!(config.openai_voice, "verse");
        assert_eq!(config.openai_temperature, 1.0);
        assert!(config.greet_first);
        assert_eq!(config.negotiation_delay_ms, 250);
        assert_eq!(
            config.forwarding_directory.get("Linus").map(String::as_str),
            Some("5550003")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_plain_http_lead_url() {
        cleanup_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-env");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
leads:
  url: "http://leads.example.com/intake"
"#,
        )
        .unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("HTTPS"));

        cleanup_env_vars();
    }
}
