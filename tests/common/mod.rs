#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each test binary uses a different subset of these helpers"
)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use realtime_socket::Result;
use realtime_socket::error::Error;
use realtime_socket::ws::config::{Config, ReconnectConfig};
use realtime_socket::ws::{
    CloseInfo, ConnectionManager, ConnectionState, Connector, Envelope, Frame, Handler, Transport,
    WsError,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

const WAIT: Duration = Duration::from_secs(600);

/// What the next call to [`MockConnector::connect`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    /// Accept, but every send takes this long to complete
    AcceptSlow(Duration),
    Refuse,
    /// Never resolves, like a peer that never answers the handshake
    Hang,
}

/// Scripted connector. Every accepted connection hands a [`MockPeer`] to the test.
#[derive(Clone)]
pub struct MockConnector {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    peers: mpsc::UnboundedSender<MockPeer>,
    attempts: Arc<AtomicU32>,
    protocols: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    /// Outcomes are consumed in order; once exhausted every attempt is refused.
    pub fn new<I: IntoIterator<Item = Outcome>>(
        script: I,
    ) -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            peers,
            attempts: Arc::new(AtomicU32::new(0)),
            protocols: Arc::new(Mutex::new(Vec::new())),
        };
        (connector, peers_rx)
    }

    /// Number of times a transport was requested.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Sub-protocols offered on the most recent attempt.
    pub fn protocols(&self) -> Vec<String> {
        self.protocols.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _address: &Url, protocols: &[String]) -> Result<MockTransport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.protocols.lock() = protocols.to_vec();

        let outcome = self.script.lock().pop_front().unwrap_or(Outcome::Refuse);
        let send_delay = match outcome {
            Outcome::Accept => None,
            Outcome::AcceptSlow(delay) => Some(delay),
            Outcome::Refuse => return Err(WsError::ConnectionClosed.into()),
            Outcome::Hang => futures::future::pending().await,
        };

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let (closes, closes_rx) = mpsc::unbounded_channel();

        drop(self.peers.send(MockPeer {
            to_client,
            from_client,
            closes: closes_rx,
        }));

        Ok(MockTransport {
            incoming,
            outgoing,
            closes,
            send_delay,
        })
    }
}

pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Result<Frame>>,
    outgoing: mpsc::UnboundedSender<String>,
    closes: mpsc::UnboundedSender<CloseInfo>,
    send_delay: Option<Duration>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        self.outgoing
            .send(text)
            .map_err(|_closed| Error::from(WsError::ConnectionClosed))
    }

    async fn next(&mut self) -> Option<Result<Frame>> {
        self.incoming.recv().await
    }

    async fn close(&mut self, info: CloseInfo) -> Result<()> {
        drop(self.closes.send(info));
        Ok(())
    }
}

/// Server side of an accepted [`MockTransport`].
pub struct MockPeer {
    to_client: mpsc::UnboundedSender<Result<Frame>>,
    from_client: mpsc::UnboundedReceiver<String>,
    closes: mpsc::UnboundedReceiver<CloseInfo>,
}

impl MockPeer {
    pub fn send_text(&self, text: &str) {
        drop(self.to_client.send(Ok(Frame::Text(text.to_owned()))));
    }

    pub fn close(&self, code: u16, reason: &str) {
        drop(
            self.to_client
                .send(Ok(Frame::Close(CloseInfo::new(code, reason)))),
        );
    }

    pub fn fail(&self) {
        drop(self.to_client.send(Err(WsError::ConnectionClosed.into())));
    }

    /// Next frame the client transmitted.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(WAIT, self.from_client.recv()).await.ok().flatten()
    }

    /// Frames the client transmitted so far.
    pub fn sent(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(text);
        }
        sent
    }

    /// Close handshake initiated by the client.
    pub async fn next_close(&mut self) -> Option<CloseInfo> {
        timeout(WAIT, self.closes.recv()).await.ok().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Open,
    Message(Envelope),
    Error(String),
    Close(CloseInfo),
    Reconnect(u32),
}

/// Handler that forwards every hook invocation to the test.
pub struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

impl Handler for Recorder {
    fn on_open(&self) {
        drop(self.tx.send(Event::Open));
    }

    fn on_message(&self, envelope: &Envelope) {
        drop(self.tx.send(Event::Message(envelope.clone())));
    }

    fn on_error(&self, error: &Error) {
        drop(self.tx.send(Event::Error(error.to_string())));
    }

    fn on_close(&self, info: &CloseInfo) {
        drop(self.tx.send(Event::Close(info.clone())));
    }

    fn on_reconnect(&self, attempt: u32) {
        drop(self.tx.send(Event::Reconnect(attempt)));
    }
}

pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    pub async fn next(&mut self) -> Event {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a handler event")
            .expect("handler dropped")
    }

    /// Events recorded so far.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn recorder() -> (Recorder, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder { tx }, Events { rx })
}

pub fn address() -> Url {
    "ws://mock.test/ws/chat".parse().unwrap()
}

/// Heartbeat far enough out that it never interferes unless a test asks for it.
pub fn config(max_attempts: u32, interval: Duration) -> Config {
    Config::builder()
        .heartbeat_interval(Duration::from_secs(3600))
        .reconnect(
            ReconnectConfig::builder()
                .max_attempts(max_attempts)
                .interval(interval)
                .build(),
        )
        .build()
}

pub async fn wait_for<C: Connector>(manager: &ConnectionManager<C>, state: ConnectionState) {
    let mut states = manager.state_receiver();
    timeout(WAIT, states.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_elapsed| panic!("timed out waiting for {state}"))
        .unwrap();
}
