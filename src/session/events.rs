//! Per-session engine event pump
//!
//! Each session gets one task draining its engine event channel. The task
//! holds only a `Weak<Session>`: a session that has been dropped from the
//! registry (and from every in-flight snapshot) is not kept alive by its own
//! event stream, and events arriving after that are no-ops.
//!
//! State events are applied to the session. Local descriptions and candidates
//! are forwarded as [`LocalSignal`]s for the signaling side to deliver.

use std::sync::Weak;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Session, SessionId, ViewerId};
use crate::transport::{EventReceiver, SessionDescription, TransportEvent};

/// Locally produced negotiation output that must reach the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSignal {
    /// The engine produced the local description
    Description {
        viewer_id: ViewerId,
        session_id: SessionId,
        description: SessionDescription,
    },
    /// The engine gathered a local candidate
    Candidate {
        viewer_id: ViewerId,
        session_id: SessionId,
        candidate: String,
    },
}

impl LocalSignal {
    pub fn viewer_id(&self) -> &ViewerId {
        match self {
            LocalSignal::Description { viewer_id, .. } => viewer_id,
            LocalSignal::Candidate { viewer_id, .. } => viewer_id,
        }
    }
}

/// Receiving end of the registry's local signal stream
pub type LocalSignals = mpsc::UnboundedReceiver<LocalSignal>;

/// Spawn the pump for one session
pub(crate) fn spawn_event_pump(
    session: Weak<Session>,
    mut events: EventReceiver,
    signals: mpsc::UnboundedSender<LocalSignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(session) = session.upgrade() else {
                tracing::trace!(?event, "Event for dropped session ignored");
                break;
            };

            handle_event(&session, event, &signals);
        }
    })
}

fn handle_event(
    session: &Session,
    event: TransportEvent,
    signals: &mpsc::UnboundedSender<LocalSignal>,
) {
    match event {
        TransportEvent::StateChanged(next) => {
            let prev = session.connection_state();
            if session.apply_event(&event) {
                tracing::info!(
                    viewer = %session.viewer_id(),
                    session = %session.session_id(),
                    from = %prev,
                    to = %next,
                    "Connection state changed"
                );
            }
        }
        TransportEvent::GatheringChanged(state) => {
            tracing::debug!(
                viewer = %session.viewer_id(),
                state = ?state,
                "Gathering state changed"
            );
        }
        TransportEvent::TrackOpen | TransportEvent::TrackClosed => {
            if session.apply_event(&event) {
                tracing::info!(
                    viewer = %session.viewer_id(),
                    session = %session.session_id(),
                    open = session.is_track_ready(),
                    "Track readiness changed"
                );
            }
        }
        TransportEvent::LocalDescription(description) => {
            if session.is_closed() {
                tracing::debug!(viewer = %session.viewer_id(), "Local description for closed session dropped");
                return;
            }
            let _ = signals.send(LocalSignal::Description {
                viewer_id: session.viewer_id().clone(),
                session_id: session.session_id().clone(),
                description,
            });
        }
        TransportEvent::LocalCandidate(candidate) => {
            if session.is_closed() {
                tracing::debug!(viewer = %session.viewer_id(), "Local candidate for closed session dropped");
                return;
            }
            let _ = signals.send(LocalSignal::Candidate {
                viewer_id: session.viewer_id().clone(),
                session_id: session.session_id().clone(),
                candidate,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::transport::testing::MockEngine;
    use crate::transport::{
        ConnectionConfig, ConnectionState, TrackSpec, TransportEngine, TransportEvent,
    };

    async fn setup() -> (
        Arc<Session>,
        Arc<crate::transport::testing::MockConnection>,
        LocalSignals,
    ) {
        let engine = MockEngine::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        let connection = engine
            .open(&ConnectionConfig::default(), events_tx)
            .await
            .unwrap();
        let track = connection
            .add_send_only_track(&TrackSpec::default())
            .await
            .unwrap();
        let session = Arc::new(Session::new("v1".into(), "s1".into(), connection, track));
        spawn_event_pump(Arc::downgrade(&session), events_rx, signals_tx);

        (session, engine.last(), signals_rx)
    }

    #[tokio::test]
    async fn test_pump_applies_state_events() {
        let (session, conn, _signals) = setup().await;
        let mut state = session.watch_state();

        conn.make_ready();

        let ready = tokio::time::timeout(Duration::from_secs(1), state.wait_for(|s| s.is_ready()))
            .await
            .expect("session never became ready")
            .is_ok();
        assert!(ready);
        assert_eq!(session.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_pump_forwards_local_signals() {
        let (session, conn, mut signals) = setup().await;

        session.create_local_description().await.unwrap();
        conn.emit(TransportEvent::LocalCandidate("candidate:1 1 udp 1 10.0.0.1 5000 typ host".into()));

        match signals.recv().await.unwrap() {
            LocalSignal::Description {
                viewer_id,
                session_id,
                description,
            } => {
                assert_eq!(viewer_id.as_str(), "v1");
                assert_eq!(session_id.as_str(), "s1");
                assert!(description.sdp.starts_with("v=0"));
            }
            other => panic!("unexpected signal: {:?}", other),
        }
        assert!(matches!(
            signals.recv().await.unwrap(),
            LocalSignal::Candidate { .. }
        ));
    }

    #[tokio::test]
    async fn test_closed_session_signals_are_dropped() {
        let (session, conn, mut signals) = setup().await;

        session.close().await;
        conn.emit(TransportEvent::LocalCandidate("candidate:late".into()));

        let res = tokio::time::timeout(Duration::from_millis(100), signals.recv()).await;
        assert!(res.is_err(), "no signal expected after close");
        assert_eq!(session.connection_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_pump_stops_when_session_dropped() {
        let (session, conn, mut signals) = setup().await;

        drop(session);
        conn.emit(TransportEvent::LocalCandidate("candidate:orphan".into()));

        // Pump exits and drops its sender, closing the signal stream
        let res = tokio::time::timeout(Duration::from_secs(1), signals.recv()).await;
        assert_eq!(res.unwrap(), None);
    }
}
