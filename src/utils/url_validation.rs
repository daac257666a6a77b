//! URL validation for outbound collaborator endpoints
//!
//! Lead submissions carry caller names and phone numbers, so the intake endpoint
//! must be reached over HTTPS. Plain HTTP is accepted only for loopback hosts,
//! which is what local workflow runners and test doubles listen on.

use std::net::IpAddr;
use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be HTTPS, got: {0}")]
    HttpsRequired(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Returns true if the host is a loopback address or `localhost`
pub fn is_loopback_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => IpAddr::V4(*ip).is_loopback(),
        Host::Ipv6(ip) => IpAddr::V6(*ip).is_loopback(),
    }
}

/// Validates the URL of an outbound collaborator (lead intake)
///
/// 1. URL must be valid and parseable
/// 2. URL must have a host
/// 3. Scheme must be HTTPS, or HTTP on a loopback host
///
/// # Example
/// ```rust
/// use callbridge::utils::url_validation::validate_collaborator_url;
///
/// assert!(validate_collaborator_url("https://leads.example.com/intake").is_ok());
/// assert!(validate_collaborator_url("http://127.0.0.1:8080/intake").is_ok());
/// assert!(validate_collaborator_url("http://leads.example.com/intake").is_err());
/// ```
pub fn validate_collaborator_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;
    let host = parsed.host().ok_or(UrlValidationError::MissingHost)?;

    match parsed.scheme() {
        "https" => {}
        "http" if is_loopback_host(&host) => {
            warn!(url = %parsed, "Collaborator URL uses plain HTTP on a loopback host");
        }
        other => return Err(UrlValidationError::HttpsRequired(other.to_string())),
    }

    Ok(parsed)
}
