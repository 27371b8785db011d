//! Signaling
//!
//! Flat JSON messages exchanged with a relay over WebSocket. The relay only
//! forwards; it never interprets SDP or candidates.
//!
//! # Inbound
//!
//! | `type` / field            | Action                                       |
//! |---------------------------|----------------------------------------------|
//! | `registration_successful` | record `client_id`                           |
//! | `create_new_offer`        | create session, send offer                   |
//! | `viewer_joined`           | create session, send offer                   |
//! | `sdp` with `answer`       | apply to the viewer's session                |
//! | `candidate`               | add to the viewer's session                  |
//!
//! Everything else is ignored. Messages naming a viewer without a session
//! are dropped with a warning. Answers and candidates go to the viewer's
//! registered session whatever `session_id` they carry, since the relay may
//! fill one in on the viewer's behalf.

pub mod bridge;
pub mod config;
pub mod error;
pub mod message;
pub mod relay;

pub use bridge::{Handled, SignalingBridge};
pub use config::SignalingConfig;
pub use error::SignalingError;
pub use message::{InboundMessage, OfferTrigger, OutboundMessage};
pub use relay::run_relay;
