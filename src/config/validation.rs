use url::Url;

use super::ServerConfig;
use crate::core::tools::validate_forwarding_number;
use crate::utils::url_validation::validate_collaborator_url;

/// Realtime sessions reject temperatures outside this range.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

/// Validate a fully merged configuration
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_openai(config)?;
    validate_lead_intake(&config.lead_intake_url)?;
    validate_twilio_credentials(&config.twilio_account_sid, &config.twilio_auth_token)?;
    validate_session_bounds(config)?;

    for (name, number) in &config.forwarding_directory {
        validate_forwarding_number(number)
            .map_err(|e| format!("Invalid forwarding number for {name}: {e}"))?;
    }

    Ok(())
}

/// Validate the realtime credential, endpoint and sampling temperature
pub fn validate_openai(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.openai_api_key.trim().is_empty() {
        return Err(
            "OPENAI_API_KEY is required (set it in the environment, .env or openai.api_key)".into(),
        );
    }

    let url = Url::parse(&config.openai_realtime_url)
        .map_err(|e| format!("Invalid OPENAI_REALTIME_URL: {e}"))?;
    if url.scheme() != "wss" && url.scheme() != "ws" {
        return Err(format!(
            "OPENAI_REALTIME_URL must use ws or wss, got: {}",
            url.scheme()
        )
        .into());
    }

    if !TEMPERATURE_RANGE.contains(&config.openai_temperature) {
        return Err(format!(
            "OPENAI_TEMPERATURE must be between {} and {}, got {}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end(),
            config.openai_temperature
        )
        .into());
    }

    Ok(())
}

/// Validate the lead intake endpoint if one is configured
pub fn validate_lead_intake(url: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(url) = url {
        validate_collaborator_url(url).map_err(|e| format!("Invalid LEAD_INTAKE_URL: {e}"))?;
    }
    Ok(())
}

/// Connect timeout and session lifetime must both be positive
pub fn validate_session_bounds(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.upstream_connect_timeout_seconds == 0 {
        return Err("UPSTREAM_CONNECT_TIMEOUT_SECONDS must be greater than 0".into());
    }
    if config.max_session_duration_seconds == 0 {
        return Err("MAX_SESSION_DURATION_SECONDS must be greater than 0".into());
    }
    Ok(())
}

/// Twilio credentials are only useful together
pub fn validate_twilio_credentials(
    account_sid: &Option<String>,
    auth_token: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (account_sid, auth_token) {
        (Some(_), None) => {
            Err("TWILIO_AUTH_TOKEN is required when TWILIO_ACCOUNT_SID is set".into())
        }
        (None, Some(_)) => {
            Err("TWILIO_ACCOUNT_SID is required when TWILIO_AUTH_TOKEN is set".into())
        }
        _ => Ok(()),
    }
}
