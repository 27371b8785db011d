//! In-memory engine for tests
//!
//! Records every call made by the core and lets tests inject engine events.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    ConnectionConfig, ConnectionState, EventSender, MediaTrack, NegotiationError, PeerConnection,
    RemoteCandidate, SessionDescription, TrackSpec, TransportEngine, TransportError,
    TransportEvent,
};

#[derive(Default)]
pub(crate) struct MockEngine {
    connections: Mutex<Vec<Arc<MockConnection>>>,
    fail_open: AtomicBool,
}

impl MockEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub(crate) fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    pub(crate) fn last(&self) -> Arc<MockConnection> {
        self.connections.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl TransportEngine for MockEngine {
    async fn open(
        &self,
        _config: &ConnectionConfig,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnection>, TransportError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Engine("open refused".into()));
        }
        let conn = Arc::new(MockConnection {
            events,
            closes: AtomicUsize::new(0),
            close_delay: Mutex::new(Duration::ZERO),
            offers: AtomicUsize::new(0),
            remote_descriptions: Mutex::new(Vec::new()),
            remote_candidates: Mutex::new(Vec::new()),
            track: Mutex::new(None),
        });
        self.connections.lock().unwrap().push(conn.clone());
        Ok(conn)
    }
}

pub(crate) struct MockConnection {
    events: EventSender,
    closes: AtomicUsize,
    close_delay: Mutex<Duration>,
    offers: AtomicUsize,
    remote_descriptions: Mutex<Vec<SessionDescription>>,
    remote_candidates: Mutex<Vec<RemoteCandidate>>,
    track: Mutex<Option<Arc<MockTrack>>>,
}

impl MockConnection {
    pub(crate) fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Drive the connection to Connected with an open track
    pub(crate) fn make_ready(&self) {
        self.emit(TransportEvent::StateChanged(ConnectionState::Connecting));
        self.emit(TransportEvent::StateChanged(ConnectionState::Connected));
        self.emit(TransportEvent::TrackOpen);
    }

    /// Make `close` take this long after it is counted, like a real teardown
    pub(crate) fn slow_close(&self, delay: Duration) {
        *self.close_delay.lock().unwrap() = delay;
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub(crate) fn offer_count(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub(crate) fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.remote_descriptions.lock().unwrap().clone()
    }

    pub(crate) fn remote_candidates(&self) -> Vec<RemoteCandidate> {
        self.remote_candidates.lock().unwrap().clone()
    }

    pub(crate) fn track(&self) -> Arc<MockTrack> {
        self.track.lock().unwrap().clone().unwrap()
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn add_send_only_track(
        &self,
        _spec: &TrackSpec,
    ) -> Result<Arc<dyn MediaTrack>, TransportError> {
        let track = Arc::new(MockTrack::default());
        *self.track.lock().unwrap() = Some(track.clone());
        Ok(track)
    }

    async fn create_local_description(&self) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(TransportEvent::LocalDescription(SessionDescription::offer(
            format!("v=0\r\no=mock {} 0 IN IP4 127.0.0.1\r\n", n),
        )));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        if !description.sdp.starts_with("v=0") {
            return Err(NegotiationError::InvalidDescription("missing v= line".into()));
        }
        self.remote_descriptions.lock().unwrap().push(description);
        Ok(())
    }

    async fn add_remote_candidate(
        &self,
        candidate: RemoteCandidate,
    ) -> Result<(), NegotiationError> {
        if self.is_closed() {
            return Err(NegotiationError::Closed);
        }
        if !candidate.candidate.starts_with("candidate:") {
            return Err(NegotiationError::InvalidCandidate(candidate.candidate));
        }
        self.remote_candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.close_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.emit(TransportEvent::TrackClosed);
        self.emit(TransportEvent::StateChanged(ConnectionState::Closed));
    }
}

#[derive(Default)]
pub(crate) struct MockTrack {
    sent: Mutex<Vec<Bytes>>,
    fail: AtomicBool,
}

impl MockTrack {
    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }
}

impl MediaTrack for MockTrack {
    fn send(&self, sample: Bytes) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Backpressure);
        }
        self.sent.lock().unwrap().push(sample);
        Ok(())
    }
}
