//! Transport engine error types

/// Error reported by the transport engine for connection and track operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection or track has been closed
    #[error("transport closed")]
    Closed,

    /// The track cannot accept data at this instant
    #[error("track send queue full")]
    Backpressure,

    /// Engine-specific failure (connection setup, track creation, runtime)
    #[error("transport engine error: {0}")]
    Engine(String),
}

/// Error raised when the engine rejects a description or candidate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// The SDP could not be parsed
    #[error("malformed session description: {0}")]
    InvalidDescription(String),

    /// The candidate could not be parsed
    #[error("malformed ICE candidate: {0}")]
    InvalidCandidate(String),

    /// The signaling state does not allow the operation
    #[error("negotiation rejected: {0}")]
    Rejected(String),

    /// The connection is already closed
    #[error("connection closed")]
    Closed,
}
