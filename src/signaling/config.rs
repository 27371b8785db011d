//! Signaling configuration

/// Signaling bridge configuration
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Role announced to the relay on connect
    pub client_type: String,

    /// Start a fresh session when an answer arrives for an unknown viewer
    ///
    /// Viewers that reload can answer an offer from a round the sender no
    /// longer has; re-offering lets them recover without a new join.
    pub answer_fallback: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            client_type: "sender".to_string(),
            answer_fallback: true,
        }
    }
}

impl SignalingConfig {
    pub fn client_type(mut self, client_type: impl Into<String>) -> Self {
        self.client_type = client_type.into();
        self
    }

    pub fn answer_fallback(mut self, enabled: bool) -> Self {
        self.answer_fallback = enabled;
        self
    }
}
