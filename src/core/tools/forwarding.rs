//! Call forwarding: the static directory and the live-call transfer client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use url::Url;
use zeroize::Zeroize;

use super::ToolError;
use crate::core::telephony::dial_twiml;
use crate::utils::url_validation::validate_collaborator_url;

/// Where to send the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDirective {
    pub person: String,
    pub number: String,
}

impl TransferDirective {
    pub fn twiml(&self) -> String {
        dial_twiml(&self.number)
    }
}

/// Person name to phone number. Lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingDirectory {
    entries: BTreeMap<String, String>,
}

impl ForwardingDirectory {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, person: &str) -> Option<TransferDirective> {
        self.entries.get(person).map(|number| TransferDirective {
            person: person.to_string(),
            number: number.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies a transfer to a call that is in progress.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn transfer(&self, call_sid: &str, directive: &TransferDirective)
    -> Result<(), ToolError>;
}

/// Redirects a live call through the Twilio REST API.
pub struct TwilioCallControl {
    client: reqwest::Client,
    base_url: Url,
    account_sid: String,
    auth_token: String,
}

impl TwilioCallControl {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        account_sid: String,
        auth_token: String,
    ) -> Result<Self, ToolError> {
        Ok(Self {
            client,
            base_url: validate_collaborator_url(base_url)?,
            account_sid,
            auth_token,
        })
    }

    /// `Calls/{CallSid}.json` resource for this account.
    pub fn call_url(&self, call_sid: &str) -> Result<Url, ToolError> {
        let path = format!(
            "2010-04-01/Accounts/{}/Calls/{}.json",
            self.account_sid, call_sid
        );
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(&path)
            .map_err(|e| ToolError::InvalidEndpoint(e.into()))
    }
}

impl Drop for TwilioCallControl {
    fn drop(&mut self) {
        self.auth_token.zeroize();
    }
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn transfer(
        &self,
        call_sid: &str,
        directive: &TransferDirective,
    ) -> Result<(), ToolError> {
        let response = self
            .client
            .post(self.call_url(call_sid)?)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Twiml", directive.twiml())])
            .send()
            .await?;

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
