use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::core::bridge::{NegotiationSettings, RelayPolicy};
use crate::core::realtime::{OpenAIRealtimeFactory, RealtimeConfig, RealtimeFactory};
use crate::core::tools::ToolHandler;

/// Connect timeout for collaborator HTTP calls.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state that can be shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    /// Opens one realtime connection per bridged call
    pub realtime_factory: Arc<dyn RealtimeFactory>,
    /// Lead intake and call forwarding, shared by all calls
    pub tools: Arc<ToolHandler>,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;

        let tools = ToolHandler::from_config(&config, http_client)?;
        let realtime_factory = OpenAIRealtimeFactory::new(Self::realtime_config(&config))?;

        if config.lead_intake_url.is_none() {
            tracing::warn!("LEAD_INTAKE_URL not set, captured leads will only be logged");
        }
        if !config.has_call_control() {
            tracing::info!("Twilio credentials not set, call forwarding will not transfer calls");
        }

        Ok(Self::with_collaborators(
            config,
            Arc::new(realtime_factory),
            Arc::new(tools),
        ))
    }

    /// Build state around injected collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        realtime_factory: Arc<dyn RealtimeFactory>,
        tools: Arc<ToolHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            realtime_factory,
            tools,
        })
    }

    pub fn realtime_config(config: &ServerConfig) -> RealtimeConfig {
        RealtimeConfig {
            api_key: config.openai_api_key.clone(),
            url: config.openai_realtime_url.clone(),
            model: config.openai_model.clone(),
            connect_timeout: config.upstream_connect_timeout(),
        }
    }

    pub fn negotiation_settings(&self) -> NegotiationSettings {
        NegotiationSettings::from_config(&self.config)
    }

    pub fn relay_policy(&self) -> RelayPolicy {
        RelayPolicy::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    #[tokio::test]
    async fn test_new_wires_collaborators() {
        let state = AppState::new(test_config()).await.unwrap();
        assert_eq!(state.tools.directory().len(), 2);
        assert!(state.relay_policy().close_call_on_upstream_loss);
        assert_eq!(
            state.relay_policy().max_session_duration,
            Duration::from_secs(3600)
        );
        assert!(state.realtime_factory.create().is_ok());
    }

    #[test]
    fn test_realtime_config_from_server_config() {
        let config = test_config();
        let realtime = AppState::realtime_config(&config);
        assert_eq!(realtime.api_key, "sk-test");
        assert_eq!(realtime.model, "gpt-4o-mini-realtime-preview-2024-12-17");
        assert_eq!(realtime.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_new_rejects_insecure_lead_url() {
        let mut config = test_config();
        config.lead_intake_url = Some("http://leads.example.com/hook".to_string());
        assert!(AppState::new(config).await.is_err());
    }
}
