//! Crate-level error type
//!
//! Module errors convert into [`Error`] so startup code and the relay loop
//! can use `?` across layers.

use crate::registry::RegistryError;
use crate::signaling::SignalingError;
use crate::transport::TransportError;

/// Result alias for fallible crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error("signaling relay error: {0}")]
    Relay(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
