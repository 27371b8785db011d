//! Per-viewer session
//!
//! A `Session` owns one engine connection and its single outbound track for
//! one negotiation round with one viewer. Its state changes only in response
//! to engine events, which the event pump applies (see [`events`]).

pub mod events;
pub mod id;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use crate::transport::{
    ConnectionState, MediaTrack, NegotiationError, PeerConnection, RemoteCandidate,
    SessionDescription, TransportError, TransportEvent,
};

pub use events::{LocalSignal, LocalSignals};
pub use id::{SessionId, ViewerId};
pub use state::SessionState;

/// One viewer's connection, track and lifecycle state
pub struct Session {
    viewer_id: ViewerId,
    session_id: SessionId,
    connection: Arc<dyn PeerConnection>,
    track: Arc<dyn MediaTrack>,
    state: watch::Sender<SessionState>,
    closed: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        viewer_id: ViewerId,
        session_id: SessionId,
        connection: Arc<dyn PeerConnection>,
        track: Arc<dyn MediaTrack>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::new());

        Self {
            viewer_id,
            session_id,
            connection,
            track,
            state,
            closed: AtomicBool::new(false),
        }
    }

    /// Viewer this session delivers to
    pub fn viewer_id(&self) -> &ViewerId {
        &self.viewer_id
    }

    /// Negotiation round this session belongs to
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.borrow().connection
    }

    /// Whether the outbound track is open
    pub fn is_track_ready(&self) -> bool {
        self.state.borrow().track_ready
    }

    /// Whether media may be delivered (Connected, track open, not closing)
    pub fn is_ready(&self) -> bool {
        !self.is_closed() && self.state.borrow().is_ready()
    }

    /// Subscribe to state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Whether `close` has been called on this session
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the connection
    ///
    /// Only the first call reaches the engine. Returns whether this call
    /// performed the close.
    pub async fn close(&self) -> bool {
        if !self.mark_closed() {
            return false;
        }
        self.close_connection().await;
        true
    }

    /// Flag the session closed without touching the engine
    ///
    /// Returns whether this call claimed the close; the caller must then
    /// finish it with [`Session::close_connection`].
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Engine half of `close`
    pub(crate) async fn close_connection(&self) {
        self.connection.close().await;

        tracing::debug!(
            viewer = %self.viewer_id,
            session = %self.session_id,
            "Connection closed"
        );
    }

    /// Ask the engine for the local offer
    pub async fn create_local_description(&self) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        self.connection.create_local_description().await
    }

    /// Apply the viewer's description
    pub async fn apply_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        self.connection.set_remote_description(description).await
    }

    /// Apply a viewer candidate
    pub async fn add_remote_candidate(
        &self,
        candidate: RemoteCandidate,
    ) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        self.connection.add_remote_candidate(candidate).await
    }

    /// Hand one sample to the track
    pub fn send(&self, sample: Bytes) -> Result<(), TransportError> {
        self.track.send(sample)
    }

    /// Apply a state-bearing engine event. Returns whether the state changed.
    pub(crate) fn apply_event(&self, event: &TransportEvent) -> bool {
        self.state.send_if_modified(|state| match event {
            TransportEvent::StateChanged(next) => state.on_connection_state(*next),
            TransportEvent::TrackOpen => state.on_track_open(),
            TransportEvent::TrackClosed => state.on_track_closed(),
            _ => false,
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("viewer_id", &self.viewer_id)
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
