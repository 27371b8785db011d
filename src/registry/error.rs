//! Registry error types

use crate::session::ViewerId;
use crate::transport::TransportError;

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// The engine could not open the connection or attach the track
    #[error("failed to set up session for viewer {viewer}: {source}")]
    Setup {
        viewer: ViewerId,
        #[source]
        source: TransportError,
    },
}
