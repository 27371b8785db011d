//! Registry configuration

use std::time::Duration;

use crate::transport::{ConnectionConfig, TrackSpec};

/// Policy for removing sessions stuck in Disconnected, Failed or Closed
///
/// Disabled by default: stale sessions stay registered until they are
/// removed, replaced by a reconnecting viewer, or the registry is shut down.
#[derive(Debug, Clone)]
pub struct ReapPolicy {
    /// How long a session may stay stale before it is removed (None = never)
    pub grace_period: Option<Duration>,

    /// How often the reaper task sweeps the registry
    pub interval: Duration,
}

impl Default for ReapPolicy {
    fn default() -> Self {
        Self {
            grace_period: None,
            interval: Duration::from_secs(5),
        }
    }
}

impl ReapPolicy {
    /// Whether stale sessions are reaped at all
    pub fn is_enabled(&self) -> bool {
        self.grace_period.is_some()
    }
}

/// Configuration for the session registry
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Settings for every connection the registry opens
    pub connection: ConnectionConfig,

    /// The send-only track added to every connection
    pub track: TrackSpec,

    /// Stale session removal
    pub reap: ReapPolicy,
}

impl RegistryConfig {
    /// Set the connection configuration
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Set the track specification
    pub fn track(mut self, track: TrackSpec) -> Self {
        self.track = track;
        self
    }

    /// Remove sessions that stay stale longer than `grace`
    pub fn reap_after(mut self, grace: Duration) -> Self {
        self.reap.grace_period = Some(grace);
        self
    }

    /// Set the reaper sweep interval
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap.interval = interval;
        self
    }
}
