//! Session registry implementation
//!
//! The central map of viewer id to live session. Every mutation goes through
//! here; fan-out and signaling only ever see `Arc<Session>` clones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::error::RegistryError;
use crate::session::events::spawn_event_pump;
use crate::session::{LocalSignal, LocalSignals, Session, SessionId, ViewerId};
use crate::transport::TransportEngine;

/// Registry of per-viewer sessions
///
/// The map sits behind a single `RwLock`. The lock is held only for map
/// access: a session taken out of the map is flagged closed under the lock,
/// so fan-out and negotiation stop using it at once, and its engine
/// connection is torn down after the lock is released.
pub struct SessionRegistry {
    /// Map of viewer id to live session
    sessions: RwLock<HashMap<ViewerId, Arc<Session>>>,

    /// Engine that opens connections
    engine: Arc<dyn TransportEngine>,

    /// Sink for local descriptions and candidates of every session
    signals: mpsc::UnboundedSender<LocalSignal>,

    /// Configuration
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    ///
    /// Returns the registry and the stream of local signals its sessions
    /// produce.
    pub fn new(engine: Arc<dyn TransportEngine>) -> (Self, LocalSignals) {
        Self::with_config(engine, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(
        engine: Arc<dyn TransportEngine>,
        config: RegistryConfig,
    ) -> (Self, LocalSignals) {
        let (signals, rx) = mpsc::unbounded_channel();

        let registry = Self {
            sessions: RwLock::new(HashMap::new()),
            engine,
            signals,
            config,
        };

        (registry, rx)
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create a session for a viewer, replacing any existing one
    ///
    /// The connection and track are set up first, outside the lock. The
    /// previous session (if any) is then flagged closed and the new one
    /// installed under a single write lock, so concurrent readers see either
    /// the old session or the new one. The old connection is closed once the
    /// lock is dropped. If setup fails the existing session is left untouched.
    pub async fn create(
        &self,
        viewer_id: ViewerId,
        session_id: SessionId,
    ) -> Result<Arc<Session>, RegistryError> {
        let session = self.open_session(viewer_id.clone(), session_id).await?;

        let replaced = {
            let mut sessions = self.sessions.write().await;

            let replaced = sessions.remove(&viewer_id).and_then(|previous| {
                tracing::info!(
                    viewer = %viewer_id,
                    old_session = %previous.session_id(),
                    new_session = %session.session_id(),
                    "Session replaced"
                );
                detach(previous)
            });

            sessions.insert(viewer_id.clone(), Arc::clone(&session));

            tracing::info!(
                viewer = %viewer_id,
                session = %session.session_id(),
                sessions = sessions.len(),
                "Session created"
            );
            replaced
        };

        if let Some(previous) = replaced {
            previous.close_connection().await;
        }

        Ok(session)
    }

    async fn open_session(
        &self,
        viewer_id: ViewerId,
        session_id: SessionId,
    ) -> Result<Arc<Session>, RegistryError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let connection = self
            .engine
            .open(&self.config.connection, events_tx)
            .await
            .map_err(|source| RegistryError::Setup {
                viewer: viewer_id.clone(),
                source,
            })?;

        let track = match connection.add_send_only_track(&self.config.track).await {
            Ok(track) => track,
            Err(source) => {
                connection.close().await;
                return Err(RegistryError::Setup {
                    viewer: viewer_id,
                    source,
                });
            }
        };

        let session = Arc::new(Session::new(viewer_id, session_id, connection, track));
        spawn_event_pump(Arc::downgrade(&session), events_rx, self.signals.clone());

        Ok(session)
    }

    /// Look up the session for a viewer
    pub async fn get(&self, viewer_id: &ViewerId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(viewer_id).cloned()
    }

    /// Close and remove the session for a viewer
    ///
    /// Returns whether a session was removed. Removing an absent viewer is a
    /// no-op.
    pub async fn remove(&self, viewer_id: &ViewerId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(viewer_id);
            if let Some(session) = &removed {
                tracing::info!(
                    viewer = %viewer_id,
                    session = %session.session_id(),
                    sessions = sessions.len(),
                    "Session removed"
                );
            }
            removed
        };

        match removed {
            Some(session) => {
                if let Some(session) = detach(session) {
                    session.close_connection().await;
                }
                true
            }
            None => false,
        }
    }

    /// Copy of all current sessions, for iteration outside the lock
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of registered sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Registered viewer ids, sorted
    pub async fn viewer_ids(&self) -> Vec<ViewerId> {
        let mut ids: Vec<ViewerId> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Close every session and clear the registry
    ///
    /// Returns the number of sessions closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        let count = drained.len();

        for session in drained.into_iter().filter_map(detach) {
            session.close_connection().await;
        }

        tracing::info!(closed = count, "All sessions closed");
        count
    }

    /// Run one reap sweep
    ///
    /// Removes sessions that have been Disconnected, Failed or Closed for at
    /// least the configured grace period. Does nothing when reaping is
    /// disabled. Returns the reaped viewer ids.
    pub async fn reap_stale(&self) -> Vec<ViewerId> {
        let Some(grace) = self.config.reap.grace_period else {
            return Vec::new();
        };

        let (stale, reaped) = {
            let mut sessions = self.sessions.write().await;
            let now = Instant::now();

            let stale: Vec<ViewerId> = sessions
                .iter()
                .filter_map(|(viewer_id, session)| match session.state().stale_for(now) {
                    Some(stale_for) if stale_for >= grace => Some(viewer_id.clone()),
                    _ => None,
                })
                .collect();

            let mut reaped = Vec::with_capacity(stale.len());
            for viewer_id in &stale {
                if let Some(session) = sessions.remove(viewer_id) {
                    tracing::info!(
                        viewer = %viewer_id,
                        session = %session.session_id(),
                        state = %session.connection_state(),
                        "Stale session reaped"
                    );
                    reaped.extend(detach(session));
                }
            }
            (stale, reaped)
        };

        for session in reaped {
            session.close_connection().await;
        }

        stale
    }

    /// Spawn the background reaper task
    ///
    /// Returns `None` when reaping is disabled. Abort the handle to stop it.
    pub fn spawn_reaper_task(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.reap.is_enabled() {
            return None;
        }

        let registry = Arc::clone(self);
        let interval = registry.config.reap.interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.reap_stale().await;
            }
        }))
    }
}

/// Flag a session leaving the map as closed
///
/// Returns it when its engine close is still owed, which the caller runs
/// after releasing the map lock.
fn detach(session: Arc<Session>) -> Option<Arc<Session>> {
    session.mark_closed().then_some(session)
}
