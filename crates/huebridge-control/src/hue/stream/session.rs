//! Entertainment streaming session
//!
//! ```text
//! Disconnected -> Handshaking -> Connected -> Closing -> Disconnected
//! ```
//!
//! `send()` only writes in `Connected`; in every other state the update is
//! dropped, the next DMX frame supersedes it anyway. A failed write drops the
//! transport and returns the session to `Disconnected`. Re-establishing the
//! session is up to the owner (see `bridge`), never done internally.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::dtls::{PskCredentials, StreamTransport, TransportConnector};
use super::protocol;
use crate::dmx::ColorSink;
use crate::error::SessionError;
use crate::hue::models::ColorUpdate;

/// Connection state of a [`StreamingSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Connected,
    Closing,
}

struct Inner {
    state: SessionState,
    transport: Option<Box<dyn StreamTransport>>,
    sequence: u8,
    /// Last message written, replayed by keepalive
    last_frame: Option<Vec<u8>>,
    last_write: Option<Instant>,
    /// Bumped by close(), invalidates handshakes in flight
    generation: u64,
}

/// Encrypted stream to the bridge
pub struct StreamingSession {
    host: String,
    credentials: PskCredentials,
    connector: Arc<dyn TransportConnector>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
}

impl StreamingSession {
    pub fn new(
        host: impl Into<String>,
        credentials: PskCredentials,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            host: host.into(),
            credentials,
            connector,
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                transport: None,
                sequence: 0,
                last_frame: None,
                last_write: None,
                generation: 0,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Observe state changes. A change to `Connected` is the "connected"
    /// notification.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, inner: &mut Inner, state: SessionState) {
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    /// Perform the DTLS handshake with the bridge.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Disconnected {
                return Err(SessionError::AlreadyActive);
            }
            inner.generation += 1;
            self.set_state(&mut inner, SessionState::Handshaking);
            inner.generation
        };

        info!("Performing streaming mode handshake with {}...", self.host);
        let connector = Arc::clone(&self.connector);
        let host = self.host.clone();
        let credentials = self.credentials.clone();
        let result = tokio::task::spawn_blocking(move || connector.connect(&host, &credentials))
            .await
            .unwrap_or_else(|e| Err(SessionError::Handshake(format!("handshake task failed: {}", e))));

        let mut inner = self.inner.lock();
        let current = inner.state == SessionState::Handshaking && inner.generation == generation;
        match result {
            Ok(transport) if current => {
                transport_reset(&mut inner);
                inner.transport = Some(transport);
                self.set_state(&mut inner, SessionState::Connected);
                info!("Connected to Hue Entertainment API");
                Ok(())
            }
            Ok(mut transport) => {
                transport.shutdown();
                Err(SessionError::Handshake(
                    "session was closed during the handshake".to_string(),
                ))
            }
            Err(e) => {
                if current {
                    self.set_state(&mut inner, SessionState::Disconnected);
                }
                Err(e)
            }
        }
    }

    /// Encode and write one frame covering `updates`. Dropped unless connected.
    pub fn send(&self, updates: &[ColorUpdate]) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Connected {
            trace!("Dropping colour update, session is {:?}", inner.state);
            return;
        }
        let sequence = next_sequence(&mut inner);
        let frame = protocol::create_message(sequence, updates);
        self.write(&mut inner, frame);
    }

    /// Rewrite the last frame if nothing was sent for `max_idle`.
    /// The bridge ends an entertainment session that stays silent for ~10s.
    pub fn keepalive(&self, max_idle: Duration) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Connected {
            return;
        }
        if inner.last_write.is_some_and(|t| t.elapsed() < max_idle) {
            return;
        }
        let Some(mut frame) = inner.last_frame.take() else {
            return;
        };
        let sequence = next_sequence(&mut inner);
        protocol::set_sequence(&mut frame, sequence);
        trace!("Keepalive: resending last frame");
        self.write(&mut inner, frame);
    }

    fn write(&self, inner: &mut Inner, frame: Vec<u8>) {
        let Some(transport) = inner.transport.as_mut() else {
            return;
        };
        match transport.write_frame(&frame) {
            Ok(()) => {
                inner.last_frame = Some(frame);
                inner.last_write = Some(Instant::now());
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                debug!("Dropped stream frame: {}", e);
                inner.last_frame = Some(frame);
            }
            Err(e) => {
                warn!("{}", SessionError::TransportDropped(e));
                inner.transport = None;
                transport_reset(inner);
                self.set_state(inner, SessionState::Disconnected);
            }
        }
    }

    /// Tear the stream down. No-op if never connected, safe to call twice.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        match inner.state {
            SessionState::Disconnected => return,
            SessionState::Handshaking => {
                // The handshake result is discarded when it completes
                self.set_state(&mut inner, SessionState::Disconnected);
                return;
            }
            SessionState::Connected | SessionState::Closing => {}
        }

        self.set_state(&mut inner, SessionState::Closing);
        if let Some(mut transport) = inner.transport.take() {
            transport.shutdown();
        }
        transport_reset(&mut inner);
        self.set_state(&mut inner, SessionState::Disconnected);
        info!("Hue streaming session closed");
    }
}

fn next_sequence(inner: &mut Inner) -> u8 {
    let sequence = inner.sequence;
    inner.sequence = sequence.wrapping_add(1);
    sequence
}

fn transport_reset(inner: &mut Inner) {
    inner.sequence = 0;
    inner.last_frame = None;
    inner.last_write = None;
}

impl ColorSink for StreamingSession {
    fn send(&self, updates: &[ColorUpdate]) {
        StreamingSession::send(self, updates)
    }
}

impl std::fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("host", &self.host)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx::Rgb16;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[derive(Default)]
    struct Wire {
        frames: Mutex<Vec<Vec<u8>>>,
        fail_writes: AtomicBool,
        shutdowns: AtomicUsize,
    }

    struct MockTransport(Arc<Wire>);

    impl StreamTransport for MockTransport {
        fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            if self.0.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            self.0.frames.lock().push(frame.to_vec());
            Ok(())
        }

        fn shutdown(&mut self) {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockConnector {
        wire: Arc<Wire>,
        refuse: bool,
        /// Handshake blocks until a message arrives
        gate: Option<Mutex<mpsc::Receiver<()>>>,
    }

    impl TransportConnector for MockConnector {
        fn connect(
            &self,
            _host: &str,
            _credentials: &PskCredentials,
        ) -> Result<Box<dyn StreamTransport>, SessionError> {
            if let Some(gate) = &self.gate {
                let _ = gate.lock().recv();
            }
            if self.refuse {
                return Err(SessionError::Handshake("refused".to_string()));
            }
            Ok(Box::new(MockTransport(Arc::clone(&self.wire))))
        }
    }

    fn session(refuse: bool) -> (StreamingSession, Arc<Wire>) {
        let wire = Arc::new(Wire::default());
        let connector = Arc::new(MockConnector {
            wire: Arc::clone(&wire),
            refuse,
            gate: None,
        });
        let creds = PskCredentials {
            identity: "user".to_string(),
            key: vec![0; 16],
        };
        (StreamingSession::new("127.0.0.1", creds, connector), wire)
    }

    fn gated_session() -> (Arc<StreamingSession>, Arc<Wire>, mpsc::Sender<()>) {
        let wire = Arc::new(Wire::default());
        let (release, gate) = mpsc::channel();
        let connector = Arc::new(MockConnector {
            wire: Arc::clone(&wire),
            refuse: false,
            gate: Some(Mutex::new(gate)),
        });
        let creds = PskCredentials {
            identity: "user".to_string(),
            key: vec![0; 16],
        };
        let session = Arc::new(StreamingSession::new("127.0.0.1", creds, connector));
        (session, wire, release)
    }

    fn updates() -> Vec<ColorUpdate> {
        vec![ColorUpdate {
            fixture_id: "1".to_string(),
            light_id: 1,
            color: Rgb16::new(1, 2, 3),
        }]
    }

    #[test]
    fn test_send_while_disconnected_is_noop() {
        let (session, wire) = session(false);
        session.send(&updates());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(wire.frames.lock().is_empty());
    }

    #[tokio::test]
    async fn test_connect_send_close() {
        let (session, wire) = session(false);
        let mut events = session.subscribe();

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert!(events.has_changed().unwrap());
        assert_eq!(*events.borrow_and_update(), SessionState::Connected);

        session.send(&updates());
        session.send(&updates());
        {
            let frames = wire.frames.lock();
            assert_eq!(frames.len(), 2);
            assert_eq!(frames[0][11], 0);
            assert_eq!(frames[1][11], 1);
            assert_eq!(frames[0].len(), protocol::HEADER_LEN + protocol::LIGHT_RECORD_LEN);
        }

        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(wire.shutdowns.load(Ordering::SeqCst), 1);

        session.send(&updates());
        assert_eq!(wire.frames.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let (session, _wire) = session(false);
        session.connect().await.unwrap();
        assert!(matches!(
            session.connect().await,
            Err(SessionError::AlreadyActive)
        ));
    }

    #[tokio::test]
    async fn test_handshake_failure_stays_disconnected() {
        let (session, _wire) = session(true);
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::Handshake(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, wire) = session(false);
        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect().await.unwrap();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(wire.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_during_handshake_discards_late_transport() {
        let (session, wire, release) = gated_session();

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.connect().await }
        });
        while session.state() != SessionState::Handshaking {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);

        release.send(()).unwrap();
        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SessionError::Handshake(_))));
        assert_eq!(wire.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Disconnected);

        session.send(&updates());
        assert!(wire.frames.lock().is_empty());
    }

    #[tokio::test]
    async fn test_transport_drop_degrades_to_noop() {
        let (session, wire) = session(false);
        session.connect().await.unwrap();

        wire.fail_writes.store(true, Ordering::SeqCst);
        session.send(&updates());
        assert_eq!(session.state(), SessionState::Disconnected);

        wire.fail_writes.store(false, Ordering::SeqCst);
        session.send(&updates());
        assert!(wire.frames.lock().is_empty());

        // Can be re-established by the owner
        session.connect().await.unwrap();
        session.send(&updates());
        assert_eq!(wire.frames.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_keepalive_resends_last_frame() {
        let (session, wire) = session(false);
        session.connect().await.unwrap();

        // Nothing sent yet, nothing to repeat
        session.keepalive(Duration::ZERO);
        assert!(wire.frames.lock().is_empty());

        session.send(&updates());
        session.keepalive(Duration::from_secs(60));
        assert_eq!(wire.frames.lock().len(), 1);

        session.keepalive(Duration::ZERO);
        let frames = wire.frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][16..], frames[1][16..]);
        assert_eq!(frames[1][11], 1);
    }
}
