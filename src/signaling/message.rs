//! Signaling wire messages
//!
//! The relay carries flat JSON objects. Inbound messages are classified by
//! `type` first and then by the presence of `sdp` or `candidate`; unknown
//! fields are ignored.

use serde::{Deserialize, Serialize};

use super::error::SignalingError;
use crate::session::{SessionId, ViewerId};
use crate::transport::{RemoteCandidate, SdpType, SessionDescription};

/// What asked for a new session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferTrigger {
    /// `create_new_offer`
    CreateNewOffer,
    /// `viewer_joined`
    ViewerJoined,
}

/// A classified inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// The relay acknowledged our registration
    Registered { client_id: String },

    /// Start a session for a viewer
    OfferRequest {
        trigger: OfferTrigger,
        viewer_id: ViewerId,
        session_id: Option<SessionId>,
    },

    /// Offer or answer from a viewer
    RemoteDescription {
        viewer_id: ViewerId,
        session_id: Option<SessionId>,
        description: SessionDescription,
    },

    /// Candidate from a viewer
    RemoteCandidate {
        viewer_id: ViewerId,
        session_id: Option<SessionId>,
        candidate: RemoteCandidate,
    },

    /// Anything else
    Ignored { kind: Option<String> },
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_id: Option<String>,
    viewer_id: Option<ViewerId>,
    session_id: Option<SessionId>,
    target_id: Option<ViewerId>,
    from: Option<ViewerId>,
    sdp: Option<String>,
    candidate: Option<String>,
    #[serde(rename = "sdpMid")]
    sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    sdp_mline_index: Option<u16>,
}

impl InboundMessage {
    /// Parse and classify one text frame
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        let raw: RawMessage = serde_json::from_str(text).map_err(SignalingError::Parse)?;
        raw.classify()
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Registered { .. } => "registration",
            InboundMessage::OfferRequest {
                trigger: OfferTrigger::CreateNewOffer,
                ..
            } => "create_new_offer",
            InboundMessage::OfferRequest {
                trigger: OfferTrigger::ViewerJoined,
                ..
            } => "viewer_joined",
            InboundMessage::RemoteDescription { .. } => "description",
            InboundMessage::RemoteCandidate { .. } => "candidate",
            InboundMessage::Ignored { .. } => "ignored",
        }
    }
}

impl RawMessage {
    fn classify(self) -> Result<InboundMessage, SignalingError> {
        let trigger = match self.kind.as_deref() {
            Some("registration_successful") => {
                let client_id = self
                    .client_id
                    .ok_or(SignalingError::MissingField("client_id"))?;
                return Ok(InboundMessage::Registered { client_id });
            }
            Some("create_new_offer") => Some(OfferTrigger::CreateNewOffer),
            Some("viewer_joined") => Some(OfferTrigger::ViewerJoined),
            _ => None,
        };

        if let Some(trigger) = trigger {
            let viewer_id = self
                .viewer_id
                .ok_or(SignalingError::MissingField("viewer_id"))?;
            return Ok(InboundMessage::OfferRequest {
                trigger,
                viewer_id,
                session_id: self.session_id,
            });
        }

        if let Some(sdp) = self.sdp {
            let kind = self.kind.ok_or(SignalingError::MissingField("type"))?;
            let sdp_type = kind
                .parse::<SdpType>()
                .map_err(|value| SignalingError::InvalidField {
                    field: "type",
                    value,
                })?;
            let viewer_id = self
                .target_id
                .or(self.from)
                .ok_or(SignalingError::MissingField("target_id"))?;

            return Ok(InboundMessage::RemoteDescription {
                viewer_id,
                session_id: self.session_id,
                description: SessionDescription { sdp_type, sdp },
            });
        }

        if let Some(candidate) = self.candidate {
            let viewer_id = self
                .target_id
                .or(self.from)
                .ok_or(SignalingError::MissingField("target_id"))?;

            return Ok(InboundMessage::RemoteCandidate {
                viewer_id,
                session_id: self.session_id,
                candidate: RemoteCandidate {
                    candidate,
                    sdp_mid: self.sdp_mid,
                    sdp_mline_index: self.sdp_mline_index,
                },
            });
        }

        Ok(InboundMessage::Ignored { kind: self.kind })
    }
}

/// A message sent to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// Role announcement, sent once on connect
    Hello { client_type: String },

    /// Local description for a viewer
    Description {
        #[serde(rename = "type")]
        sdp_type: SdpType,
        sdp: String,
        target_id: ViewerId,
        session_id: SessionId,
    },

    /// Local candidate for a viewer
    Candidate {
        candidate: String,
        #[serde(rename = "sdpMLineIndex")]
        sdp_mline_index: u16,
        #[serde(rename = "sdpMid")]
        sdp_mid: String,
        target_id: ViewerId,
        session_id: SessionId,
    },
}

impl OutboundMessage {
    /// Role announcement
    pub fn hello(client_type: impl Into<String>) -> Self {
        OutboundMessage::Hello {
            client_type: client_type.into(),
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(SignalingError::Encode)
    }

    /// Viewer the message is addressed to, if any
    pub fn target(&self) -> Option<&ViewerId> {
        match self {
            OutboundMessage::Hello { .. } => None,
            OutboundMessage::Description { target_id, .. } => Some(target_id),
            OutboundMessage::Candidate { target_id, .. } => Some(target_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_registration() {
        let msg =
            InboundMessage::parse(r#"{"type":"registration_successful","client_id":"c-1"}"#)
                .unwrap();
        assert_eq!(
            msg,
            InboundMessage::Registered {
                client_id: "c-1".into()
            }
        );
    }

    #[test]
    fn test_parse_offer_requests() {
        let msg = InboundMessage::parse(
            r#"{"type":"viewer_joined","viewer_id":"v1","session_id":"s1","extra":42}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::OfferRequest {
                trigger: OfferTrigger::ViewerJoined,
                viewer_id: "v1".into(),
                session_id: Some("s1".into()),
            }
        );

        let msg = InboundMessage::parse(r#"{"type":"create_new_offer","viewer_id":"v2"}"#).unwrap();
        assert_eq!(msg.kind(), "create_new_offer");
        assert!(matches!(
            msg,
            InboundMessage::OfferRequest {
                session_id: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_answer_with_target_or_from() {
        let msg = InboundMessage::parse(
            r#"{"type":"answer","sdp":"v=0\r\n","target_id":"v1","session_id":"s1"}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::RemoteDescription {
                viewer_id,
                session_id,
                description,
            } => {
                assert_eq!(viewer_id.as_str(), "v1");
                assert_eq!(session_id, Some("s1".into()));
                assert_eq!(description.sdp_type, SdpType::Answer);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        // `from` is accepted when `target_id` is absent
        let msg = InboundMessage::parse(r#"{"type":"answer","sdp":"v=0","from":"v9"}"#).unwrap();
        assert!(matches!(
            msg,
            InboundMessage::RemoteDescription { ref viewer_id, .. } if viewer_id.as_str() == "v9"
        ));
    }

    #[test]
    fn test_parse_candidate() {
        let msg = InboundMessage::parse(
            r#"{"candidate":"candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host","sdpMid":"0","sdpMLineIndex":0,"from":"v1"}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::RemoteCandidate {
                viewer_id,
                candidate,
                ..
            } => {
                assert_eq!(viewer_id.as_str(), "v1");
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_mline_index, Some(0));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            InboundMessage::parse("not json"),
            Err(SignalingError::Parse(_))
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"type":"viewer_joined"}"#),
            Err(SignalingError::MissingField("viewer_id"))
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"sdp":"v=0","target_id":"v1"}"#),
            Err(SignalingError::MissingField("type"))
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"type":"answr","sdp":"v=0","target_id":"v1"}"#),
            Err(SignalingError::InvalidField { field: "type", .. })
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"candidate":"candidate:1"}"#),
            Err(SignalingError::MissingField("target_id"))
        ));
    }

    #[test]
    fn test_parse_unknown_kind() {
        let msg = InboundMessage::parse(r#"{"type":"sender_status","online":true}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Ignored {
                kind: Some("sender_status".into())
            }
        );
    }

    #[test]
    fn test_outbound_wire_format() {
        let hello: serde_json::Value =
            serde_json::from_str(&OutboundMessage::hello("sender").to_json().unwrap()).unwrap();
        assert_eq!(hello, json!({"client_type": "sender"}));

        let description = OutboundMessage::Description {
            sdp_type: SdpType::Offer,
            sdp: "v=0".into(),
            target_id: "v1".into(),
            session_id: "s1".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&description.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "offer", "sdp": "v=0", "target_id": "v1", "session_id": "s1"})
        );

        let candidate = OutboundMessage::Candidate {
            candidate: "candidate:1".into(),
            sdp_mline_index: 0,
            sdp_mid: "video".into(),
            target_id: "v1".into(),
            session_id: "s1".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&candidate.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "candidate": "candidate:1",
                "sdpMLineIndex": 0,
                "sdpMid": "video",
                "target_id": "v1",
                "session_id": "s1"
            })
        );
        assert_eq!(candidate.target().map(|v| v.as_str()), Some("v1"));
    }
}
