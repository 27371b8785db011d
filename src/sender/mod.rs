//! Sender wiring
//!
//! [`SenderContext`] is built at startup from a transport engine and a
//! [`SenderConfig`], and owns the registry, the signaling bridge and the
//! fan-out. There is no global state; pass the context (or its parts) to
//! whatever needs them.

pub mod config;
pub mod context;

pub use config::{SenderConfig, DEFAULT_SINK_CAPACITY};
pub use context::SenderContext;
