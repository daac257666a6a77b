use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::utils::parse_bool;
use super::yaml::YamlConfig;
use super::{
    DEFAULT_GREETING, DEFAULT_GREETING_PROMPT, DEFAULT_PORT, DEFAULT_REALTIME_MODEL, ServerConfig,
    TlsConfig, default_forwarding_directory, parse_forwarding_directory_json,
};
use crate::core::realtime::OPENAI_REALTIME_URL;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
///
/// Called with `None` when no configuration file is given.
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();

    // Helper macro to get value with priority: YAML > ENV > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // Helper macro for optional values: YAML > ENV
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            $yaml_value.or_else(|| env::var($env_var).ok())
        };
    }

    let server = yaml.server.unwrap_or_default();
    let openai = yaml.openai.unwrap_or_default();
    let bridge = yaml.bridge.unwrap_or_default();
    let leads = yaml.leads.unwrap_or_default();
    let forwarding = yaml.forwarding.unwrap_or_default();
    let twilio = yaml.twilio.unwrap_or_default();
    let voice = yaml.voice.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    // Server configuration
    let host = get_value!("HOST", server.host, "0.0.0.0");
    let port = typed_value("PORT", server.port, DEFAULT_PORT)?;

    let tls = match server.tls {
        Some(tls) if tls.enabled == Some(false) => None,
        Some(tls) => tls_from_paths(tls.cert_path, tls.key_path)?,
        None => tls_from_paths(
            env::var("TLS_CERT_PATH").ok(),
            env::var("TLS_KEY_PATH").ok(),
        )?,
    };

    // OpenAI Realtime configuration
    let openai_api_key = get_value!("OPENAI_API_KEY", openai.api_key, "");
    let openai_realtime_url = get_value!(
        "OPENAI_REALTIME_URL",
        openai.realtime_url,
        OPENAI_REALTIME_URL
    );
    let openai_model = get_value!("OPENAI_REALTIME_MODEL", openai.model, DEFAULT_REALTIME_MODEL);
    let openai_voice = get_value!("OPENAI_VOICE", openai.voice, "alloy");
    let openai_temperature = typed_value("OPENAI_TEMPERATURE", openai.temperature, 0.8_f32)?;
    let transcribe_caller =
        bool_value("OPENAI_TRANSCRIBE_CALLER", openai.transcribe_caller, false);
    let instructions = get_optional!("ASSISTANT_INSTRUCTIONS", openai.instructions);

    // Bridge behavior
    let greet_first = bool_value("GREET_FIRST", bridge.greet_first, false);
    let negotiation_delay_ms =
        typed_value("NEGOTIATION_DELAY_MS", bridge.negotiation_delay_ms, 100_u64)?;
    let upstream_connect_timeout_seconds = typed_value(
        "UPSTREAM_CONNECT_TIMEOUT_SECONDS",
        bridge.upstream_connect_timeout_seconds,
        10_u64,
    )?;
    let max_session_duration_seconds = typed_value(
        "MAX_SESSION_DURATION_SECONDS",
        bridge.max_session_duration_seconds,
        3600_u64,
    )?;
    let close_call_on_upstream_loss = bool_value(
        "CLOSE_CALL_ON_UPSTREAM_LOSS",
        bridge.close_call_on_upstream_loss,
        true,
    );

    // Lead intake
    let lead_intake_url = get_optional!("LEAD_INTAKE_URL", leads.url);
    let lead_intake_api_key = get_optional!("LEAD_INTAKE_API_KEY", leads.api_key);

    // Forwarding directory and call control
    let forwarding_directory = match forwarding.directory {
        Some(directory) => directory,
        None => match env::var("FORWARDING_DIRECTORY_JSON") {
            Ok(json) => parse_forwarding_directory_json(&json)?,
            Err(_) => default_forwarding_directory(),
        },
    };
    let twilio_account_sid = get_optional!("TWILIO_ACCOUNT_SID", twilio.account_sid);
    let twilio_auth_token = get_optional!("TWILIO_AUTH_TOKEN", twilio.auth_token);
    let twilio_api_base_url = get_value!(
        "TWILIO_API_BASE_URL",
        twilio.api_base_url,
        "https://api.twilio.com"
    );

    // Call-routing speech
    let greeting = get_value!("GREETING", voice.greeting, DEFAULT_GREETING);
    let greeting_prompt = get_value!("GREETING_PROMPT", voice.prompt, DEFAULT_GREETING_PROMPT);

    // Security
    let cors_allowed_origins =
        get_optional!("CORS_ALLOWED_ORIGINS", security.cors_allowed_origins);
    let rate_limit_requests_per_second = typed_value(
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        security.rate_limit_requests_per_second,
        60_u32,
    )?;
    let rate_limit_burst_size = typed_value(
        "RATE_LIMIT_BURST_SIZE",
        security.rate_limit_burst_size,
        10_u32,
    )?;

    Ok(ServerConfig {
        host,
        port,
        tls,
        openai_api_key,
        openai_realtime_url,
        openai_model,
        openai_voice,
        openai_temperature,
        transcribe_caller,
        instructions,
        greet_first,
        negotiation_delay_ms,
        upstream_connect_timeout_seconds,
        max_session_duration_seconds,
        close_call_on_upstream_loss,
        lead_intake_url,
        lead_intake_api_key,
        forwarding_directory,
        twilio_account_sid,
        twilio_auth_token,
        twilio_api_base_url,
        greeting,
        greeting_prompt,
        cors_allowed_origins,
        rate_limit_requests_per_second,
        rate_limit_burst_size,
    })
}

/// YAML > ENV > default for values that must parse; a malformed env value is an error.
fn typed_value<T>(
    env_var: &str,
    yaml_value: Option<T>,
    default: T,
) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = yaml_value {
        return Ok(value);
    }
    match env::var(env_var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("Invalid {env_var} environment variable: {e}").into()),
        Err(_) => Ok(default),
    }
}

fn bool_value(env_var: &str, yaml_value: Option<bool>, default: bool) -> bool {
    yaml_value
        .or_else(|| env::var(env_var).ok().and_then(|v| parse_bool(&v)))
        .unwrap_or(default)
}

fn tls_from_paths(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err("TLS requires both a certificate path and a key path".into()),
    }
}
