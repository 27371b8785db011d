//! Media fan-out
//!
//! One encoded sample in, one non-blocking send per ready session out. Each
//! pass works on a registry snapshot, so signaling can add and remove viewers
//! while a pass is running. Per-session failures are counted and logged and
//! never stop the pass.

pub mod stats;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::SessionRegistry;
use crate::transport::TransportError;

pub use stats::{FanoutSnapshot, FanoutStats};

/// Outcome of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Sessions that accepted the sample
    pub delivered: usize,
    /// Sessions whose track rejected the sample
    pub failed: usize,
    /// Sessions not yet (or no longer) ready
    pub skipped: usize,
}

/// Delivers samples to every ready session
pub struct FrameFanout {
    registry: Arc<SessionRegistry>,
    stats: Arc<FanoutStats>,
}

impl FrameFanout {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            stats: Arc::new(FanoutStats::new()),
        }
    }

    pub fn stats(&self) -> &Arc<FanoutStats> {
        &self.stats
    }

    /// Send one sample to every session that is Connected with an open track
    pub async fn broadcast(&self, sample: Bytes) -> FanoutReport {
        let sessions = self.registry.snapshot().await;
        let mut report = FanoutReport::default();

        for session in &sessions {
            if !session.is_ready() {
                report.skipped += 1;
                continue;
            }

            match session.send(sample.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    match e {
                        TransportError::Backpressure => tracing::debug!(
                            viewer = %session.viewer_id(),
                            "Track queue full, sample dropped"
                        ),
                        e => tracing::warn!(
                            viewer = %session.viewer_id(),
                            session = %session.session_id(),
                            error = %e,
                            "Sample send failed"
                        ),
                    }
                }
            }
        }

        self.stats.record(&report, sample.len());
        tracing::trace!(
            bytes = sample.len(),
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "Sample fanned out"
        );

        report
    }

    /// Spawn a drain task and return the push handle feeding it
    ///
    /// The handle can be used from any thread. The task runs until every
    /// clone of the handle is dropped.
    pub fn spawn_sink(self: &Arc<Self>, capacity: usize) -> (SampleSink, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Bytes>(capacity.max(1));
        let fanout = Arc::clone(self);

        let handle = tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                fanout.broadcast(sample).await;
            }
            tracing::debug!("Sample sink closed");
        });

        let sink = SampleSink {
            tx,
            stats: Arc::clone(&self.stats),
        };

        (sink, handle)
    }
}

/// Non-blocking entry point for the media producer
#[derive(Clone)]
pub struct SampleSink {
    tx: mpsc::Sender<Bytes>,
    stats: Arc<FanoutStats>,
}

impl SampleSink {
    /// Queue one sample for fan-out
    ///
    /// Never blocks. Returns `false` if the sample was dropped because the
    /// queue is full or the drain task has stopped.
    pub fn push(&self, sample: Bytes) -> bool {
        match self.tx.try_send(sample) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.record_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl std::fmt::Debug for SampleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSink")
            .field("capacity", &self.tx.max_capacity())
            .finish()
    }
}
