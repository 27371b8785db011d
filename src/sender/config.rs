//! Sender configuration

use crate::registry::RegistryConfig;
use crate::signaling::SignalingConfig;

/// Default depth of the sample sink queue
///
/// Producers push RTP packets, so one frame may span many entries.
pub const DEFAULT_SINK_CAPACITY: usize = 64;

/// Top-level sender configuration
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Session registry settings (connection, track, reaping)
    pub registry: RegistryConfig,

    /// Signaling bridge settings
    pub signaling: SignalingConfig,

    /// Samples queued between the producer and the fan-out before dropping
    pub sink_capacity: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            signaling: SignalingConfig::default(),
            sink_capacity: DEFAULT_SINK_CAPACITY,
        }
    }
}

impl SenderConfig {
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    pub fn signaling(mut self, signaling: SignalingConfig) -> Self {
        self.signaling = signaling;
        self
    }

    /// Set the sink depth (at least 1)
    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity.max(1);
        self
    }
}
