//! Signaling error types

use crate::registry::RegistryError;
use crate::session::ViewerId;
use crate::transport::NegotiationError;

/// Error raised while handling a signaling message
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    /// The message is not valid JSON or has mistyped fields
    #[error("malformed signaling message: {0}")]
    Parse(#[source] serde_json::Error),

    /// A field required by the message kind is absent
    #[error("signaling message missing `{0}`")]
    MissingField(&'static str),

    /// A field carries a value outside its domain
    #[error("invalid `{field}` value: {value}")]
    InvalidField { field: &'static str, value: String },

    /// The message names a viewer with no session
    #[error("no session for viewer {0}")]
    NoSession(ViewerId),

    /// The engine rejected a description or candidate
    #[error("negotiation failed for viewer {viewer}: {source}")]
    Negotiation {
        viewer: ViewerId,
        #[source]
        source: NegotiationError,
    },

    /// The session could not be created
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An outbound message could not be encoded
    #[error("failed to encode signaling message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Nobody is draining outbound messages
    #[error("outbound signaling channel closed")]
    ChannelClosed,
}

impl SignalingError {
    /// Whether the inbound message itself was malformed
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            SignalingError::Parse(_)
                | SignalingError::MissingField(_)
                | SignalingError::InvalidField { .. }
        )
    }

    /// Whether the message could not be routed to a live session
    pub fn is_routing_error(&self) -> bool {
        matches!(self, SignalingError::NoSession(_))
    }
}
