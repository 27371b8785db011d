//! Connection and track configuration

/// Default public STUN server
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Dynamic RTP payload type used for H.264
pub const DEFAULT_PAYLOAD_TYPE: u8 = 96;

/// RTP clock rate for video
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// A STUN or TURN server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    /// Server URLs (`stun:` / `turn:`)
    pub urls: Vec<String>,
    /// TURN username
    pub username: Option<String>,
    /// TURN credential
    pub credential: Option<String>,
}

impl IceServer {
    /// Create a STUN server entry
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// Create a TURN server entry with credentials
    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Configuration for each peer connection the engine opens
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// ICE servers handed to the engine
    pub ice_servers: Vec<IceServer>,

    /// Disable automatic renegotiation; the caller triggers the offer
    pub manual_negotiation: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::stun(DEFAULT_STUN_SERVER)],
            manual_negotiation: true,
        }
    }
}

impl ConnectionConfig {
    /// Add an ICE server
    pub fn ice_server(mut self, server: IceServer) -> Self {
        self.ice_servers.push(server);
        self
    }

    /// Replace the ICE server list
    pub fn ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }
}

/// Media kind of an outbound track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Description of the single send-only track added to every connection
#[derive(Debug, Clone)]
pub struct TrackSpec {
    /// Media kind
    pub kind: MediaKind,

    /// Codec MIME type (e.g. "video/H264")
    pub mime_type: String,

    /// RTP payload type
    pub payload_type: u8,

    /// RTP clock rate
    pub clock_rate: u32,

    /// Track identifier
    pub track_id: String,

    /// Media stream identifier
    pub stream_id: String,

    /// Media section id advertised in outbound candidates
    pub mid: String,

    /// Media line index advertised in outbound candidates
    pub mline_index: u16,

    /// Samples an engine may queue per track before `send` reports backpressure
    pub send_queue_depth: usize,
}

impl Default for TrackSpec {
    fn default() -> Self {
        Self {
            kind: MediaKind::Video,
            mime_type: "video/H264".to_string(),
            payload_type: DEFAULT_PAYLOAD_TYPE,
            clock_rate: VIDEO_CLOCK_RATE,
            track_id: "video".to_string(),
            stream_id: "webrtc-fanout".to_string(),
            mid: "video".to_string(),
            mline_index: 0,
            send_queue_depth: 256,
        }
    }
}

impl TrackSpec {
    /// Set the RTP payload type
    pub fn payload_type(mut self, pt: u8) -> Self {
        self.payload_type = pt;
        self
    }

    /// Set the per-track send queue depth (minimum 1)
    pub fn send_queue_depth(mut self, depth: usize) -> Self {
        self.send_queue_depth = depth.max(1);
        self
    }
}
