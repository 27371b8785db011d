//! Session registry
//!
//! The registry owns every per-viewer session and is the only place sessions
//! are created, replaced or removed.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SessionRegistry>
//!                   ┌──────────────────────────────┐
//!                   │ sessions: HashMap<ViewerId,  │
//!                   │   Arc<Session> {             │
//!                   │     connection, track,       │
//!                   │     state: watch::Sender,    │
//!                   │   }                          │
//!                   │ >                            │
//!                   └──────────────┬───────────────┘
//!                                  │
//!        ┌─────────────────────────┼──────────────────────────┐
//!        │                         │                          │
//!        ▼                         ▼                          ▼
//!  [SignalingBridge]          [FrameFanout]              [event pumps]
//!  create()/get()/remove()    snapshot() ──► send()      Weak<Session>
//! ```
//!
//! # Snapshot Fan-out
//!
//! `snapshot()` clones the `Arc<Session>` values under a read lock and
//! releases it before any media is sent, so a slow peer never holds up
//! signaling and signaling never holds up media.

pub mod config;
pub mod error;
pub mod store;

pub use config::{ReapPolicy, RegistryConfig};
pub use error::RegistryError;
pub use store::SessionRegistry;
