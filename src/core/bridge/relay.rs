//! The relay loop: one task per call that owns both peers.
//!
//! Telephony frames and realtime events arrive on two channels and are fed
//! into the [`BridgeSession`] one at a time from a single `select!` loop, so
//! session state needs no locking. The loop also fires the delayed session
//! negotiation and enforces the session lifetime.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, warn};

use super::negotiator::SessionNegotiator;
use super::session::{BridgeAction, BridgeSession};
use crate::config::ServerConfig;
use crate::core::realtime::openai::ClientEvent;
use crate::core::realtime::{BoxedRealtime, RealtimeEvent};
use crate::core::telephony::TwilioOutbound;
use crate::core::tools::{ToolHandler, ToolInvocation};

/// Inbound traffic from the telephony socket reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyInput {
    Frame(String),
    Closed,
}

/// Outbound traffic for the telephony socket writer.
#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyRoute {
    Frame(TwilioOutbound),
    Close,
}

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    TelephonyClosed,
    UpstreamLost,
    LifetimeExceeded,
}

/// Teardown and lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    pub close_call_on_upstream_loss: bool,
    pub max_session_duration: Duration,
}

impl RelayPolicy {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            close_call_on_upstream_loss: config.close_call_on_upstream_loss,
            max_session_duration: config.max_session_duration(),
        }
    }
}

pub struct BridgeRelay {
    session: BridgeSession,
    negotiator: SessionNegotiator,
    realtime: BoxedRealtime,
    tools: Arc<ToolHandler>,
    telephony_tx: mpsc::Sender<TelephonyRoute>,
    policy: RelayPolicy,
}

async fn next_upstream(
    upstream: &mut Option<mpsc::Receiver<RealtimeEvent>>,
) -> Option<RealtimeEvent> {
    match upstream {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn negotiation_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

impl BridgeRelay {
    pub fn new(
        realtime: BoxedRealtime,
        negotiator: SessionNegotiator,
        tools: Arc<ToolHandler>,
        telephony_tx: mpsc::Sender<TelephonyRoute>,
        policy: RelayPolicy,
    ) -> Self {
        Self {
            session: BridgeSession::new(),
            negotiator,
            realtime,
            tools,
            telephony_tx,
            policy,
        }
    }

    /// Connect upstream and relay until either side goes away.
    pub async fn run(mut self, mut telephony_rx: mpsc::Receiver<TelephonyInput>) -> RelayOutcome {
        let mut upstream = match self.realtime.connect().await {
            Ok(rx) => {
                info!("Connected to the realtime API");
                self.session.on_realtime_ready();
                self.negotiator.schedule(Instant::now());
                Some(rx)
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to the realtime API");
                let actions = self
                    .session
                    .on_realtime_lost(self.policy.close_call_on_upstream_loss, Some(e.to_string()));
                if self.execute(actions).await {
                    return RelayOutcome::UpstreamLost;
                }
                None
            }
        };

        let lifetime = sleep(self.policy.max_session_duration);
        tokio::pin!(lifetime);

        let outcome = loop {
            tokio::select! {
                input = telephony_rx.recv() => {
                    let actions = match input {
                        Some(TelephonyInput::Frame(text)) => self.session.on_telephony_frame(&text),
                        Some(TelephonyInput::Closed) | None => self.session.on_telephony_closed(),
                    };
                    if self.execute(actions).await {
                        break RelayOutcome::TelephonyClosed;
                    }
                }

                event = next_upstream(&mut upstream) => {
                    let actions = match event {
                        Some(RealtimeEvent::Server(event)) => self.session.on_realtime_event(event),
                        Some(RealtimeEvent::Closed { reason }) => {
                            upstream = None;
                            self.negotiator.cancel();
                            self.session
                                .on_realtime_lost(self.policy.close_call_on_upstream_loss, reason)
                        }
                        None => {
                            upstream = None;
                            self.negotiator.cancel();
                            self.session
                                .on_realtime_lost(self.policy.close_call_on_upstream_loss, None)
                        }
                    };
                    if self.execute(actions).await {
                        break RelayOutcome::UpstreamLost;
                    }
                }

                _ = negotiation_due(self.negotiator.deadline()), if self.negotiator.deadline().is_some() => {
                    if let Some(events) = self.negotiator.take_due(Instant::now()) {
                        debug!("Sending session update");
                        for event in events {
                            self.send_upstream(event).await;
                        }
                    }
                }

                _ = &mut lifetime => {
                    warn!(
                        stream_sid = ?self.session.stream_sid(),
                        limit = ?self.policy.max_session_duration,
                        "Session lifetime exceeded"
                    );
                    self.execute(vec![
                        BridgeAction::CloseRealtime,
                        BridgeAction::CloseTelephony,
                    ])
                    .await;
                    break RelayOutcome::LifetimeExceeded;
                }
            }
        };

        if self.realtime.is_ready()
            && let Err(e) = self.realtime.disconnect().await
        {
            warn!(error = %e, "Error closing realtime connection");
        }

        info!(
            ?outcome,
            stream_sid = ?self.session.stream_sid(),
            upstream = %self.realtime.get_connection_state(),
            "Bridge session ended"
        );
        outcome
    }

    /// Perform actions in order. Returns true when the loop should stop.
    async fn execute(&mut self, actions: Vec<BridgeAction>) -> bool {
        for action in actions {
            match action {
                BridgeAction::ToTelephony(frame) => self.send_telephony(TelephonyRoute::Frame(frame)).await,
                BridgeAction::ToRealtime(event) => self.send_upstream(event).await,
                BridgeAction::InvokeTool(invocation) => self.invoke_tool(invocation).await,
                BridgeAction::CloseRealtime => {
                    if let Err(e) = self.realtime.disconnect().await {
                        warn!(error = %e, "Error closing realtime connection");
                    }
                }
                BridgeAction::CloseTelephony => self.send_telephony(TelephonyRoute::Close).await,
                BridgeAction::Terminate => return true,
            }
        }
        false
    }

    async fn send_telephony(&self, route: TelephonyRoute) {
        if self.telephony_tx.send(route).await.is_err() {
            debug!("Telephony writer gone, dropping frame");
        }
    }

    async fn send_upstream(&mut self, event: ClientEvent) {
        if !self.realtime.is_ready() {
            debug!("Realtime connection not open, dropping event");
            return;
        }
        if let Err(e) = self.realtime.send_event(event).await {
            warn!(error = %e, "Failed to send realtime event");
        }
    }

    async fn invoke_tool(&mut self, invocation: ToolInvocation) {
        info!(function = %invocation.name, call_id = %invocation.call_id, "Function call");
        let outcome = self.tools.handle(&invocation);
        if let Some(directive) = &outcome.transfer {
            info!(person = %directive.person, "Call transfer requested");
        }

        self.send_upstream(ClientEvent::function_call_output(
            invocation.call_id,
            outcome.output.to_string(),
        ))
        .await;
        self.send_upstream(ClientEvent::ResponseCreate).await;
    }
}
