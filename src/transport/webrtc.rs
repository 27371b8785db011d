//! Transport engine backed by the `webrtc` crate
//!
//! Each connection carries one `TrackLocalStaticRTP` behind a send-only
//! transceiver. The media engine knows only the codec the [`TrackSpec`]
//! names, at its payload type, so offers advertise nothing else. Samples handed to [`MediaTrack::send`] are RTP
//! packets; they go through a bounded queue to a writer task so the caller
//! never waits on the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264, MIME_TYPE_OPUS};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCPFeedback, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};

use super::{
    ConnectionConfig, ConnectionState, EventSender, GatheringState, MediaKind, MediaTrack,
    NegotiationError, PeerConnection, RemoteCandidate, SdpType, SessionDescription, TrackSpec,
    TransportEngine, TransportError, TransportEvent,
};

/// H.264 constrained baseline, packetization mode 1
const H264_FMTP: &str = "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f";

/// Codec capability for the track a spec describes
fn codec_capability(spec: &TrackSpec) -> RTCRtpCodecCapability {
    let is_h264 = spec.mime_type.eq_ignore_ascii_case(MIME_TYPE_H264);
    let is_opus = spec.mime_type.eq_ignore_ascii_case(MIME_TYPE_OPUS);

    let rtcp_feedback = match spec.kind {
        MediaKind::Video => [("goog-remb", ""), ("ccm", "fir"), ("nack", ""), ("nack", "pli")]
            .into_iter()
            .map(|(typ, parameter)| RTCPFeedback {
                typ: typ.to_owned(),
                parameter: parameter.to_owned(),
            })
            .collect(),
        MediaKind::Audio => Vec::new(),
    };

    RTCRtpCodecCapability {
        mime_type: spec.mime_type.clone(),
        clock_rate: spec.clock_rate,
        channels: if is_opus { 2 } else { 0 },
        sdp_fmtp_line: if is_h264 {
            H264_FMTP.to_owned()
        } else {
            String::new()
        },
        rtcp_feedback,
    }
}

fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Video => RTPCodecType::Video,
        MediaKind::Audio => RTPCodecType::Audio,
    }
}

/// Engine that opens `webrtc` peer connections
pub struct WebRtcEngine {
    api: API,
}

impl WebRtcEngine {
    /// Build an engine that negotiates only the codec of `track`
    pub fn new(track: &TrackSpec) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: codec_capability(track),
                    payload_type: track.payload_type,
                    ..Default::default()
                },
                codec_type(track.kind),
            )
            .map_err(|e| {
                TransportError::Engine(format!(
                    "failed to register {} at payload type {}: {}",
                    track.mime_type, track.payload_type, e
                ))
            })?;

        tracing::debug!(
            mime_type = %track.mime_type,
            payload_type = track.payload_type,
            "Registered track codec"
        );

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| TransportError::Engine(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

#[async_trait]
impl TransportEngine for WebRtcEngine {
    async fn open(
        &self,
        config: &ConnectionConfig,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnection>, TransportError> {
        let ice_servers = config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = self
            .api
            .new_peer_connection(rtc_config)
            .await
            .map_err(|e| TransportError::Engine(format!("failed to create peer connection: {}", e)))?;
        let pc = Arc::new(pc);

        install_callbacks(&pc, &events);

        Ok(Arc::new(WebRtcConnection { pc, events }))
    }
}

/// Translate engine callbacks into transport events
fn install_callbacks(pc: &RTCPeerConnection, events: &EventSender) {
    let tx = events.clone();
    let track_open = Arc::new(AtomicBool::new(false));
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        let state = match s {
            RTCPeerConnectionState::New => Some(ConnectionState::New),
            RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
            RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
            RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
            RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
            RTCPeerConnectionState::Unspecified => None,
        };

        if let Some(state) = state {
            let _ = tx.send(TransportEvent::StateChanged(state));

            // The send path is usable exactly while the transport is up
            let connected = state == ConnectionState::Connected;
            if track_open.swap(connected, Ordering::AcqRel) != connected {
                let event = if connected {
                    TransportEvent::TrackOpen
                } else {
                    TransportEvent::TrackClosed
                };
                let _ = tx.send(event);
            }
        }

        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_ice_gathering_state_change(Box::new(move |s: RTCIceGathererState| {
        let state = match s {
            RTCIceGathererState::New => Some(GatheringState::New),
            RTCIceGathererState::Gathering => Some(GatheringState::InProgress),
            RTCIceGathererState::Complete => Some(GatheringState::Complete),
            _ => None,
        };
        if let Some(state) = state {
            let _ = tx.send(TransportEvent::GatheringChanged(state));
        }
        Box::pin(async {})
    }));

    let tx = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        // None marks the end of gathering, reported through the gathering state
        if let Some(candidate) = candidate {
            match candidate.to_json() {
                Ok(init) => {
                    let _ = tx.send(TransportEvent::LocalCandidate(init.candidate));
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize local candidate"),
            }
        }
        Box::pin(async {})
    }));
}

/// One `webrtc` peer connection
struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
    events: EventSender,
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn add_send_only_track(
        &self,
        spec: &TrackSpec,
    ) -> Result<Arc<dyn MediaTrack>, TransportError> {
        let track = Arc::new(TrackLocalStaticRTP::new(
            codec_capability(spec),
            spec.track_id.clone(),
            spec.stream_id.clone(),
        ));

        let transceiver = self
            .pc
            .add_transceiver_from_track(
                Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Sendonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| TransportError::Engine(format!("failed to add track: {}", e)))?;

        // RTCP from the viewer must be read for the interceptors to run
        let sender = transceiver.sender().await;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        let (tx, mut rx) = mpsc::channel::<Bytes>(spec.send_queue_depth.max(1));
        tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                if let Err(e) = track.write(&packet).await {
                    tracing::debug!(error = %e, "RTP write failed");
                }
            }
        });

        Ok(Arc::new(WebRtcTrack { queue: tx }))
    }

    async fn create_local_description(&self) -> Result<(), NegotiationError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| NegotiationError::Rejected(format!("create offer: {}", e)))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| NegotiationError::Rejected(format!("set local description: {}", e)))?;

        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| NegotiationError::Rejected("no local description".into()))?;

        let _ = self
            .events
            .send(TransportEvent::LocalDescription(SessionDescription::offer(
                local.sdp,
            )));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let parsed = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp),
            SdpType::Answer => RTCSessionDescription::answer(description.sdp),
            other => {
                return Err(NegotiationError::Rejected(format!(
                    "unsupported description type {}",
                    other
                )))
            }
        }
        .map_err(|e| NegotiationError::InvalidDescription(e.to_string()))?;

        self.pc
            .set_remote_description(parsed)
            .await
            .map_err(|e| NegotiationError::Rejected(e.to_string()))
    }

    async fn add_remote_candidate(
        &self,
        candidate: RemoteCandidate,
    ) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::InvalidCandidate(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            tracing::warn!(error = %e, "Peer connection close failed");
        }
    }
}

/// Send side of one track's writer queue
struct WebRtcTrack {
    queue: mpsc::Sender<Bytes>,
}

impl MediaTrack for WebRtcTrack {
    fn send(&self, sample: Bytes) -> Result<(), TransportError> {
        self.queue.try_send(sample).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No ICE servers: nothing leaves the host
    fn local_config() -> ConnectionConfig {
        ConnectionConfig::default().ice_servers(Vec::new())
    }

    async fn offer_for(spec: &TrackSpec) -> SessionDescription {
        let engine = WebRtcEngine::new(spec).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let conn = engine.open(&local_config(), tx).await.unwrap();
        conn.add_send_only_track(spec).await.unwrap();
        conn.create_local_description().await.unwrap();

        let mut offer = None;
        while let Some(event) = rx.recv().await {
            if let TransportEvent::LocalDescription(description) = event {
                offer = Some(description);
                break;
            }
        }
        conn.close().await;
        offer.unwrap()
    }

    fn media_line<'a>(sdp: &'a str, kind: &str) -> &'a str {
        sdp.lines()
            .find(|line| line.starts_with(&format!("m={} ", kind)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_offer_contains_video_line() {
        let offer = offer_for(&TrackSpec::default()).await;

        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert!(offer.sdp.contains("m=video"));
        assert!(offer.sdp.contains("a=sendonly"));
    }

    #[tokio::test]
    async fn test_offer_advertises_only_track_codec() {
        let offer = offer_for(&TrackSpec::default()).await;

        // The payload list after the protocol is the codec set
        let payloads: Vec<&str> = media_line(&offer.sdp, "video").split(' ').skip(3).collect();
        assert_eq!(payloads, vec!["96"]);
        assert!(offer.sdp.contains("a=rtpmap:96 H264/90000"));
        assert!(offer.sdp.contains("packetization-mode=1"));
        assert!(!offer.sdp.contains("VP8"));
    }

    #[tokio::test]
    async fn test_offer_uses_configured_payload_type() {
        let offer = offer_for(&TrackSpec::default().payload_type(102)).await;

        let payloads: Vec<&str> = media_line(&offer.sdp, "video").split(' ').skip(3).collect();
        assert_eq!(payloads, vec!["102"]);
        assert!(offer.sdp.contains("a=rtpmap:102 H264/90000"));
        assert!(!offer.sdp.contains("a=rtpmap:96 "));
    }

    #[tokio::test]
    async fn test_audio_track_offers_audio_line() {
        let spec = TrackSpec {
            kind: MediaKind::Audio,
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48_000,
            track_id: "audio".into(),
            ..TrackSpec::default().payload_type(111)
        };
        let offer = offer_for(&spec).await;

        let payloads: Vec<&str> = media_line(&offer.sdp, "audio").split(' ').skip(3).collect();
        assert_eq!(payloads, vec!["111"]);
        assert!(offer.sdp.contains("a=rtpmap:111 opus/48000/2"));
        assert!(!offer.sdp.contains("m=video"));
    }

    #[tokio::test]
    async fn test_invalid_remote_input_rejected() {
        let engine = WebRtcEngine::new(&TrackSpec::default()).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = engine.open(&local_config(), tx).await.unwrap();

        let result = conn
            .set_remote_description(SessionDescription::answer("garbage"))
            .await;
        assert!(result.is_err());

        let result = conn
            .add_remote_candidate(RemoteCandidate::new("not a candidate"))
            .await;
        assert!(result.is_err());

        conn.close().await;
    }
}
