//! Sender context
//!
//! Wires the registry, signaling bridge and fan-out together and owns the
//! background tasks that connect them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::SenderConfig;
use crate::error::Result;
use crate::fanout::{FanoutSnapshot, FrameFanout, SampleSink};
use crate::registry::SessionRegistry;
use crate::signaling::{run_relay, OutboundMessage, SignalingBridge};
use crate::transport::TransportEngine;

/// Everything a running sender needs, built once at startup
pub struct SenderContext {
    config: SenderConfig,
    registry: Arc<SessionRegistry>,
    bridge: Arc<SignalingBridge>,
    fanout: Arc<FrameFanout>,
    sink: SampleSink,
    tasks: Vec<JoinHandle<()>>,
}

impl SenderContext {
    /// Build the context and start its background tasks
    ///
    /// Returns the context and the receiver of outbound signaling messages,
    /// which the relay client drains. Must be called inside a Tokio runtime.
    pub fn new(
        engine: Arc<dyn TransportEngine>,
        config: SenderConfig,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (registry, signals) = SessionRegistry::with_config(engine, config.registry.clone());
        let registry = Arc::new(registry);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(SignalingBridge::new(
            Arc::clone(&registry),
            outbound_tx,
            config.signaling.clone(),
        ));

        let fanout = Arc::new(FrameFanout::new(Arc::clone(&registry)));

        let mut tasks = Vec::with_capacity(3);
        tasks.push(bridge.spawn_forwarder(signals));

        let (sink, drain) = fanout.spawn_sink(config.sink_capacity);
        tasks.push(drain);

        if let Some(reaper) = registry.spawn_reaper_task() {
            tasks.push(reaper);
        }

        tracing::info!(
            sink_capacity = config.sink_capacity,
            reap = config.registry.reap.is_enabled(),
            "Sender context started"
        );

        let context = Self {
            config,
            registry,
            bridge,
            fanout,
            sink,
            tasks,
        };

        (context, outbound_rx)
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<SignalingBridge> {
        &self.bridge
    }

    pub fn fanout(&self) -> &Arc<FrameFanout> {
        &self.fanout
    }

    /// Push handle for the media producer
    pub fn sink(&self) -> SampleSink {
        self.sink.clone()
    }

    /// Current fan-out counters
    pub fn stats(&self) -> FanoutSnapshot {
        self.fanout.stats().snapshot()
    }

    /// Connect to the signaling relay and serve it until it closes
    pub async fn run_relay(
        &self,
        url: &str,
        outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    ) -> Result<()> {
        run_relay(url, Arc::clone(&self.bridge), outbound).await
    }

    /// Stop background tasks and close every session
    ///
    /// Returns the number of sessions closed.
    pub async fn shutdown(self) -> usize {
        for task in &self.tasks {
            task.abort();
        }

        let closed = self.registry.close_all().await;
        let stats = self.fanout.stats().snapshot();

        tracing::info!(
            closed,
            samples = stats.samples,
            deliveries = stats.deliveries,
            failures = stats.failures,
            dropped = stats.dropped,
            "Sender context shut down"
        );

        closed
    }
}
