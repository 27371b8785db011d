//! Session core for a one-to-many WebRTC media sender
//!
//! One live source, many viewers. Each viewer that joins through the
//! signaling relay gets its own peer connection with a single send-only
//! track; every encoded sample from the source is handed to every viewer
//! whose connection is up.
//!
//! # Layout
//!
//! - [`transport`]: traits the peer-to-peer engine implements, plus the
//!   optional `webrtc` crate adapter (feature `webrtc-engine`)
//! - [`session`]: one viewer's connection, track and state
//! - [`registry`]: viewer id to session map, the only place sessions are
//!   created, replaced or removed
//! - [`signaling`]: JSON relay messages in, registry and session calls out
//! - [`fanout`]: sample delivery to every ready session
//! - [`sender`]: startup wiring that owns all of the above
//!
//! # Quick start
//!
//! ```no_run
//! # #[cfg(feature = "webrtc-engine")]
//! # async fn run() -> webrtc_fanout::Result<()> {
//! use std::sync::Arc;
//!
//! use webrtc_fanout::sender::{SenderConfig, SenderContext};
//! use webrtc_fanout::transport::webrtc::WebRtcEngine;
//!
//! let config = SenderConfig::default();
//! let engine = Arc::new(WebRtcEngine::new(&config.registry.track)?);
//! let (context, outbound) = SenderContext::new(engine, config);
//!
//! let sink = context.sink();
//! // Feed samples from the media pipeline with `sink.push(bytes)`
//!
//! context.run_relay("ws://localhost:8080/ws", outbound).await?;
//! context.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fanout;
pub mod registry;
pub mod sender;
pub mod session;
pub mod signaling;
pub mod transport;

pub use error::{Error, Result};
pub use fanout::{FanoutReport, FrameFanout, SampleSink};
pub use registry::{RegistryConfig, SessionRegistry};
pub use sender::{SenderConfig, SenderContext};
pub use session::{Session, SessionId, ViewerId};
pub use signaling::{SignalingBridge, SignalingConfig};
