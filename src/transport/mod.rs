//! Transport engine boundary
//!
//! The peer-to-peer engine (ICE, DTLS/SRTP, RTP framing) lives behind three
//! traits. The core only sequences control calls into it and consumes the
//! events it reports.
//!
//! ```text
//!   TransportEngine::open(config, events_tx) ──► PeerConnection
//!                                                  │
//!                      add_send_only_track() ──────┼──► MediaTrack::send(bytes)
//!                 create_local_description() ──────┤
//!                   set_remote_description() ──────┤
//!                     add_remote_candidate() ──────┤
//!                                    close() ──────┘
//!
//!   engine threads ──► events_tx ──► per-session pump ──► Session / SignalingBridge
//! ```
//!
//! Events are pushed onto the unbounded channel handed to `open`, so the
//! engine never blocks on the core and the core never runs inside an engine
//! callback.

pub mod config;
pub mod error;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "webrtc-engine")]
pub mod webrtc;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use config::{ConnectionConfig, IceServer, MediaKind, TrackSpec};
pub use error::{NegotiationError, TransportError};

/// Channel on which an engine reports events for one connection
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a connection's event channel
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Peer connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Whether the connection is down (or going down) without an explicit removal
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// ICE gathering state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    InProgress,
    Complete,
}

/// SDP type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
            SdpType::Pranswer => "pranswer",
            SdpType::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SdpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(SdpType::Offer),
            "answer" => Ok(SdpType::Answer),
            "pranswer" => Ok(SdpType::Pranswer),
            "rollback" => Ok(SdpType::Rollback),
            other => Err(other.to_string()),
        }
    }
}

/// A session description (offer or answer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A candidate received from the remote viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

impl RemoteCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// Event reported by the engine for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Peer connection state changed
    StateChanged(ConnectionState),
    /// ICE gathering state changed
    GatheringChanged(GatheringState),
    /// Local description is ready to be signaled
    LocalDescription(SessionDescription),
    /// Local candidate is ready to be signaled
    LocalCandidate(String),
    /// The outbound track can carry media
    TrackOpen,
    /// The outbound track can no longer carry media
    TrackClosed,
}

/// Factory for peer connections
#[async_trait]
pub trait TransportEngine: Send + Sync + 'static {
    /// Open a new connection; its events are pushed onto `events`
    async fn open(
        &self,
        config: &ConnectionConfig,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnection>, TransportError>;
}

/// One peer connection owned by exactly one session
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Add a send-only media track
    async fn add_send_only_track(
        &self,
        spec: &TrackSpec,
    ) -> Result<Arc<dyn MediaTrack>, TransportError>;

    /// Start local description creation. The result arrives as
    /// `TransportEvent::LocalDescription`.
    async fn create_local_description(&self) -> Result<(), NegotiationError>;

    /// Apply the remote viewer's description
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Apply a remote candidate
    async fn add_remote_candidate(&self, candidate: RemoteCandidate)
        -> Result<(), NegotiationError>;

    /// Close the connection. Must tolerate repeated calls.
    async fn close(&self);
}

/// Outbound media track
pub trait MediaTrack: Send + Sync {
    /// Hand one encoded sample to the track without waiting on the network
    fn send(&self, sample: Bytes) -> Result<(), TransportError>;
}
