//! Signaling bridge
//!
//! Turns inbound relay messages into registry and session operations, and
//! turns the sessions' local descriptions and candidates into outbound relay
//! messages. The bridge never touches the socket itself: outbound messages go
//! to a channel that the relay client drains.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use super::config::SignalingConfig;
use super::error::SignalingError;
use super::message::{InboundMessage, OutboundMessage};
use crate::registry::SessionRegistry;
use crate::session::{LocalSignal, LocalSignals, Session, SessionId, ViewerId};
use crate::transport::SdpType;

/// What handling one inbound message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The relay assigned us a client id
    Registered,
    /// A new session was created and its offer requested
    SessionStarted {
        viewer_id: ViewerId,
        session_id: SessionId,
    },
    /// The viewer's answer was applied to its session
    DescriptionApplied { viewer_id: ViewerId },
    /// The viewer's candidate was applied to its session
    CandidateApplied { viewer_id: ViewerId },
    /// Nothing to do
    Ignored,
}

/// Bridge between the signaling relay and the session registry
pub struct SignalingBridge {
    registry: Arc<SessionRegistry>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    local_id: RwLock<Option<String>>,
    config: SignalingConfig,
}

impl SignalingBridge {
    pub fn new(
        registry: Arc<SessionRegistry>,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        config: SignalingConfig,
    ) -> Self {
        Self {
            registry,
            outbound,
            local_id: RwLock::new(None),
            config,
        }
    }

    pub fn config(&self) -> &SignalingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Client id assigned by the relay, once registered
    pub async fn local_id(&self) -> Option<String> {
        self.local_id.read().await.clone()
    }

    /// Handle one text frame from the relay
    ///
    /// Never fails: malformed and unroutable messages are logged and
    /// dropped so the next message is processed normally.
    pub async fn handle_text(&self, text: &str) {
        let (kind, result) = match InboundMessage::parse(text) {
            Ok(message) => (message.kind(), self.handle(message).await),
            Err(e) => ("unparsed", Err(e)),
        };

        match result {
            Ok(handled) => {
                tracing::trace!(kind, ?handled, "Signaling message handled");
            }
            Err(e) if e.is_parse_error() => {
                tracing::warn!(error = %e, "Dropping malformed signaling message");
            }
            Err(e) if e.is_routing_error() => {
                tracing::warn!(kind, error = %e, "Signaling message dropped");
            }
            Err(e) => {
                tracing::error!(kind, error = %e, "Signaling message failed");
            }
        }
    }

    /// Handle one classified inbound message
    pub async fn handle(&self, message: InboundMessage) -> Result<Handled, SignalingError> {
        match message {
            InboundMessage::Registered { client_id } => {
                tracing::info!(client_id = %client_id, "Registered with signaling relay");
                *self.local_id.write().await = Some(client_id);
                Ok(Handled::Registered)
            }

            InboundMessage::OfferRequest {
                trigger,
                viewer_id,
                session_id,
            } => {
                tracing::info!(viewer = %viewer_id, ?trigger, "Offer requested");
                let session_id = session_id.unwrap_or_else(SessionId::generate);
                self.start_session(viewer_id, session_id).await
            }

            InboundMessage::RemoteDescription {
                viewer_id,
                session_id,
                description,
            } => {
                if description.sdp_type != SdpType::Answer {
                    tracing::debug!(
                        viewer = %viewer_id,
                        sdp_type = %description.sdp_type,
                        "Ignoring remote description that is not an answer"
                    );
                    return Ok(Handled::Ignored);
                }

                let Some(session) = self.registry.get(&viewer_id).await else {
                    if !self.config.answer_fallback {
                        return Err(SignalingError::NoSession(viewer_id));
                    }
                    tracing::warn!(
                        viewer = %viewer_id,
                        "Answer for unknown viewer, starting a fresh session"
                    );
                    let session_id = session_id.unwrap_or_else(SessionId::generate);
                    return self.start_session(viewer_id, session_id).await;
                };

                note_round(&session, session_id.as_ref());
                session
                    .apply_remote_description(description)
                    .await
                    .map_err(|source| SignalingError::Negotiation {
                        viewer: viewer_id.clone(),
                        source,
                    })?;

                tracing::info!(
                    viewer = %viewer_id,
                    session = %session.session_id(),
                    "Answer applied"
                );
                Ok(Handled::DescriptionApplied { viewer_id })
            }

            InboundMessage::RemoteCandidate {
                viewer_id,
                session_id,
                candidate,
            } => {
                let session = self
                    .registry
                    .get(&viewer_id)
                    .await
                    .ok_or_else(|| SignalingError::NoSession(viewer_id.clone()))?;

                note_round(&session, session_id.as_ref());
                session
                    .add_remote_candidate(candidate)
                    .await
                    .map_err(|source| SignalingError::Negotiation {
                        viewer: viewer_id.clone(),
                        source,
                    })?;

                tracing::debug!(viewer = %viewer_id, "Remote candidate applied");
                Ok(Handled::CandidateApplied { viewer_id })
            }

            InboundMessage::Ignored { kind } => {
                tracing::debug!(kind = ?kind, "Ignoring signaling message");
                Ok(Handled::Ignored)
            }
        }
    }

    async fn start_session(
        &self,
        viewer_id: ViewerId,
        session_id: SessionId,
    ) -> Result<Handled, SignalingError> {
        let session = self
            .registry
            .create(viewer_id.clone(), session_id.clone())
            .await?;

        session
            .create_local_description()
            .await
            .map_err(|source| SignalingError::Negotiation {
                viewer: viewer_id.clone(),
                source,
            })?;

        Ok(Handled::SessionStarted {
            viewer_id,
            session_id,
        })
    }

    /// Translate a local signal into an outbound message and queue it
    pub fn forward(&self, signal: LocalSignal) -> Result<(), SignalingError> {
        let track = &self.registry.config().track;

        let message = match signal {
            LocalSignal::Description {
                viewer_id,
                session_id,
                description,
            } => OutboundMessage::Description {
                sdp_type: description.sdp_type,
                sdp: description.sdp,
                target_id: viewer_id,
                session_id,
            },
            LocalSignal::Candidate {
                viewer_id,
                session_id,
                candidate,
            } => OutboundMessage::Candidate {
                candidate,
                sdp_mline_index: track.mline_index,
                sdp_mid: track.mid.clone(),
                target_id: viewer_id,
                session_id,
            },
        };

        self.outbound
            .send(message)
            .map_err(|_| SignalingError::ChannelClosed)
    }

    /// Spawn the task that forwards every local signal to the relay
    pub fn spawn_forwarder(self: &Arc<Self>, mut signals: LocalSignals) -> JoinHandle<()> {
        let bridge = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let viewer = signal.viewer_id().clone();
                if let Err(e) = bridge.forward(signal) {
                    tracing::warn!(viewer = %viewer, error = %e, "Local signal not forwarded");
                    break;
                }
            }
            tracing::debug!("Local signal forwarder stopped");
        })
    }
}

/// The relay may stamp its own round id on viewer replies, so a mismatch
/// is only noted; the registered session always takes the message.
fn note_round(session: &Session, received: Option<&SessionId>) {
    if let Some(received) = received.filter(|r| *r != session.session_id()) {
        tracing::debug!(
            viewer = %session.viewer_id(),
            received = %received,
            current = %session.session_id(),
            "Session id differs from the registered session"
        );
    }
}
