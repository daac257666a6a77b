//! Lead capture: posting caller details to the intake workflow.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;
use zeroize::Zeroize;

use super::ToolError;
use crate::utils::url_validation::validate_collaborator_url;

/// Upper bound on one intake request.
pub const LEAD_INTAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A prospective customer collected during the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub name: String,
    pub phone: String,
    pub conversation_history: String,
}

/// Destination for captured leads.
///
/// Submissions are fire-and-forget from the caller's point of view; the
/// result only feeds the log.
#[async_trait]
pub trait LeadIntake: Send + Sync {
    /// Submit once. `true` on success, no retries.
    async fn submit(&self, lead: &Lead) -> bool;
}

/// Posts leads as JSON to an HTTPS workflow trigger.
pub struct HttpLeadIntake {
    client: reqwest::Client,
    url: Url,
    api_key: Option<String>,
}

impl HttpLeadIntake {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        api_key: Option<String>,
    ) -> Result<Self, ToolError> {
        let url = validate_collaborator_url(url)?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    async fn try_submit(&self, lead: &Lead) -> Result<(), ToolError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .timeout(LEAD_INTAKE_TIMEOUT)
            .json(lead);
        if let Some(key) = &self.api_key {
            request = request
                .bearer_auth(key)
                .header("X-Workflow-Api-Key", key.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ToolError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

impl Drop for HttpLeadIntake {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[async_trait]
impl LeadIntake for HttpLeadIntake {
    async fn submit(&self, lead: &Lead) -> bool {
        match self.try_submit(lead).await {
            Ok(()) => {
                info!(name = %lead.name, "Lead submitted");
                true
            }
            Err(e) => {
                error!(name = %lead.name, error = %e, "Lead submission failed");
                false
            }
        }
    }
}

/// Used when no intake URL is configured.
pub struct DisabledLeadIntake;

#[async_trait]
impl LeadIntake for DisabledLeadIntake {
    async fn submit(&self, lead: &Lead) -> bool {
        warn!(name = %lead.name, "Lead intake not configured, dropping lead");
        false
    }
}
