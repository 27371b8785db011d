//! Session state machine
//!
//! Mirrors the engine-reported connection state plus the independent
//! track-readiness flag. A connection can reach Connected before its track
//! has opened, so media eligibility needs both.

use std::time::{Duration, Instant};

use crate::transport::ConnectionState;

/// Observable state of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// Last connection state reported by the engine
    pub connection: ConnectionState,

    /// Whether the outbound track is open
    pub track_ready: bool,

    /// When `connection` last changed
    pub since: Instant,
}

impl SessionState {
    /// Create the initial state (New, track not ready)
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::New,
            track_ready: false,
            since: Instant::now(),
        }
    }

    /// Whether media may be delivered
    pub fn is_ready(&self) -> bool {
        self.connection == ConnectionState::Connected && self.track_ready
    }

    /// Whether the connection has reached its terminal state
    pub fn is_closed(&self) -> bool {
        self.connection == ConnectionState::Closed
    }

    /// Apply an engine-reported connection state
    ///
    /// Closed is terminal; anything reported after it is ignored. Returns
    /// whether the state changed.
    pub fn on_connection_state(&mut self, next: ConnectionState) -> bool {
        if self.is_closed() || self.connection == next {
            return false;
        }

        self.connection = next;
        self.since = Instant::now();

        if next == ConnectionState::Closed {
            self.track_ready = false;
        }

        true
    }

    /// Handle a track-open event. Returns whether the flag changed.
    pub fn on_track_open(&mut self) -> bool {
        if self.is_closed() || self.track_ready {
            return false;
        }
        self.track_ready = true;
        true
    }

    /// Handle a track-closed event. Returns whether the flag changed.
    pub fn on_track_closed(&mut self) -> bool {
        let changed = self.track_ready;
        self.track_ready = false;
        changed
    }

    /// How long the session has been Disconnected, Failed or Closed
    pub fn stale_for(&self, now: Instant) -> Option<Duration> {
        if self.connection.is_stale() {
            Some(now.saturating_duration_since(self.since))
        } else {
            None
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new();

        assert_eq!(state.connection, ConnectionState::New);
        assert!(!state.is_ready());

        assert!(state.on_connection_state(ConnectionState::Connecting));
        assert!(state.on_connection_state(ConnectionState::Connected));
        assert!(!state.is_ready()); // Track not open yet

        assert!(state.on_track_open());
        assert!(state.is_ready());

        assert!(state.on_connection_state(ConnectionState::Disconnected));
        assert!(!state.is_ready());
        assert!(state.track_ready); // Track flag is independent
    }

    #[test]
    fn test_track_open_before_connected() {
        let mut state = SessionState::new();

        state.on_track_open();
        assert!(!state.is_ready());

        state.on_connection_state(ConnectionState::Connected);
        assert!(state.is_ready());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = SessionState::new();
        state.on_connection_state(ConnectionState::Connected);
        state.on_track_open();

        assert!(state.on_connection_state(ConnectionState::Closed));
        assert!(!state.track_ready);

        // Late events after close are ignored
        assert!(!state.on_connection_state(ConnectionState::Connected));
        assert!(!state.on_track_open());
        assert_eq!(state.connection, ConnectionState::Closed);
        assert!(!state.is_ready());
    }

    #[test]
    fn test_repeated_state_is_not_a_change() {
        let mut state = SessionState::new();
        assert!(!state.on_connection_state(ConnectionState::New));
        assert!(!state.on_track_closed());
    }

    #[test]
    fn test_stale_for() {
        let mut state = SessionState::new();
        let now = Instant::now();
        assert_eq!(state.stale_for(now), None);

        state.on_connection_state(ConnectionState::Failed);
        let later = state.since + Duration::from_secs(3);
        assert_eq!(state.stale_for(later), Some(Duration::from_secs(3)));
    }
}
