//! Function calls the assistant can make during a call.
//!
//! Two tools are declared to the model: lead submission and call forwarding.
//! The handler decodes a completed function call, starts any side effect on a
//! detached task and immediately returns the output the model should see, so
//! the relay loop never waits on a collaborator.

mod forwarding;
mod lead;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

pub use forwarding::{CallControl, ForwardingDirectory, TransferDirective, TwilioCallControl};
pub use lead::{DisabledLeadIntake, HttpLeadIntake, LEAD_INTAKE_TIMEOUT, Lead, LeadIntake};

use crate::config::ServerConfig;
use crate::core::realtime::openai::ToolDef;
use crate::utils::UrlValidationError;

pub const SUBMIT_LEAD: &str = "submit_lead";
pub const CALL_FORWARDING: &str = "call_forwarding";

/// Names used by earlier prompt revisions, still honored when dispatching.
const SUBMIT_LEAD_ALIASES: &[&str] = &["submitToRetool", "submitLead"];
const CALL_FORWARDING_ALIASES: &[&str] = &["callForwarding"];

/// Errors from tool argument decoding and collaborator calls.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments for {function}: {source}")]
    InvalidArguments {
        function: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid collaborator endpoint: {0}")]
    InvalidEndpoint(#[from] UrlValidationError),

    #[error("Invalid phone number {0:?}: expected 7 to 15 digits with an optional leading +")]
    InvalidNumber(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collaborator rejected the request with status {status}")]
    Rejected { status: u16 },
}

/// Check a directory entry before it can be dialed.
pub fn validate_forwarding_number(number: &str) -> Result<(), ToolError> {
    let digits = number.strip_prefix('+').unwrap_or(number);
    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ToolError::InvalidNumber(number.to_string()))
    }
}

/// Tool declarations sent in the session configuration.
pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef {
            tool_type: "function".to_string(),
            name: SUBMIT_LEAD.to_string(),
            description: Some(
                "Submits the caller's name, phone number and a summary of the conversation \
                 once they show interest."
                    .to_string(),
            ),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "phone": { "type": "string" },
                    "conversationHistory": { "type": "string" }
                },
                "required": ["name", "phone", "conversationHistory"]
            })),
        },
        ToolDef {
            tool_type: "function".to_string(),
            name: CALL_FORWARDING.to_string(),
            description: Some(
                "Forwards the call to a specific person based on the caller's request.".to_string(),
            ),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" }
                },
                "required": ["name"]
            })),
        },
    ]
}

/// A completed function call from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
    /// Telephony call the invocation belongs to, when known
    pub call_sid: Option<String>,
    /// Conversation so far, one `role: text` line per turn
    pub transcript: String,
}

/// What to tell the model, and whether the call is being transferred.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub output: Value,
    pub transfer: Option<TransferDirective>,
}

impl ToolOutcome {
    fn status(status: &str) -> Self {
        Self {
            output: json!({ "status": status }),
            transfer: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LeadArguments {
    #[serde(default, alias = "customerName")]
    name: String,
    #[serde(default)]
    phone: String,
    #[serde(default, rename = "conversationHistory")]
    conversation_history: String,
}

#[derive(Debug, Deserialize)]
struct ForwardingArguments {
    name: String,
}

fn decode<'a, T: Deserialize<'a>>(invocation: &'a ToolInvocation) -> Result<T, ToolError> {
    serde_json::from_str(&invocation.arguments).map_err(|source| ToolError::InvalidArguments {
        function: invocation.name.clone(),
        source,
    })
}

/// Dispatches function calls to the lead intake and call forwarding.
pub struct ToolHandler {
    leads: Arc<dyn LeadIntake>,
    directory: ForwardingDirectory,
    call_control: Option<Arc<dyn CallControl>>,
}

impl ToolHandler {
    pub fn new(
        leads: Arc<dyn LeadIntake>,
        directory: ForwardingDirectory,
        call_control: Option<Arc<dyn CallControl>>,
    ) -> Self {
        Self {
            leads,
            directory,
            call_control,
        }
    }

    /// Wire up collaborators from configuration, sharing one HTTP client.
    pub fn from_config(config: &ServerConfig, client: reqwest::Client) -> Result<Self, ToolError> {
        let leads: Arc<dyn LeadIntake> = match &config.lead_intake_url {
            Some(url) => Arc::new(HttpLeadIntake::new(
                client.clone(),
                url,
                config.lead_intake_api_key.clone(),
            )?),
            None => Arc::new(DisabledLeadIntake),
        };

        let call_control: Option<Arc<dyn CallControl>> =
            match (&config.twilio_account_sid, &config.twilio_auth_token) {
                (Some(sid), Some(token)) => Some(Arc::new(TwilioCallControl::new(
                    client,
                    &config.twilio_api_base_url,
                    sid.clone(),
                    token.clone(),
                )?)),
                _ => None,
            };

        Ok(Self::new(
            leads,
            ForwardingDirectory::new(config.forwarding_directory.clone()),
            call_control,
        ))
    }

    pub fn directory(&self) -> &ForwardingDirectory {
        &self.directory
    }

    /// Decode and act on one function call.
    ///
    /// Side effects run on detached tasks; must be called inside a runtime.
    pub fn handle(&self, invocation: &ToolInvocation) -> ToolOutcome {
        let name = invocation.name.as_str();
        let result = if name == SUBMIT_LEAD || SUBMIT_LEAD_ALIASES.contains(&name) {
            self.submit_lead(invocation)
        } else if name == CALL_FORWARDING || CALL_FORWARDING_ALIASES.contains(&name) {
            self.forward_call(invocation)
        } else {
            warn!(function = name, call_id = %invocation.call_id, "Unknown function call");
            Ok(ToolOutcome::status("unknown_function"))
        };

        result.unwrap_or_else(|e| {
            warn!(call_id = %invocation.call_id, error = %e, "Function call failed");
            ToolOutcome::status("invalid_arguments")
        })
    }

    fn submit_lead(&self, invocation: &ToolInvocation) -> Result<ToolOutcome, ToolError> {
        let args: LeadArguments = decode(invocation)?;
        let conversation_history = if args.conversation_history.trim().is_empty() {
            invocation.transcript.clone()
        } else {
            args.conversation_history
        };
        let lead = Lead {
            name: args.name,
            phone: args.phone,
            conversation_history,
        };

        info!(name = %lead.name, "Submitting lead");
        let leads = self.leads.clone();
        tokio::spawn(async move {
            leads.submit(&lead).await;
        });

        Ok(ToolOutcome::status("accepted"))
    }

    fn forward_call(&self, invocation: &ToolInvocation) -> Result<ToolOutcome, ToolError> {
        let args: ForwardingArguments = decode(invocation)?;
        let Some(directive) = self.directory.lookup(&args.name) else {
            info!(person = %args.name, "No forwarding entry");
            return Ok(ToolOutcome::status("unavailable"));
        };

        info!(person = %directive.person, number = %directive.number, "Forwarding call");

        match (&self.call_control, &invocation.call_sid) {
            (Some(control), Some(call_sid)) => {
                let control = control.clone();
                let call_sid = call_sid.clone();
                let spawned = directive.clone();
                tokio::spawn(async move {
                    if let Err(e) = control.transfer(&call_sid, &spawned).await {
                        error!(%call_sid, error = %e, "Call transfer failed");
                    }
                });
            }
            (None, _) => info!("No call control configured, transfer not applied"),
            (_, None) => warn!("Call SID unknown, transfer not applied"),
        }

        Ok(ToolOutcome {
            output: json!({ "status": "forwarding", "person": directive.person }),
            transfer: Some(directive),
        })
    }
}
