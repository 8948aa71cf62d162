#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use backoff::backoff::{Backoff as _, Constant};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, timeout};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::Config;
use super::envelope::{self, Envelope};
use super::error::WsError;
use super::state::{CloseInfo, ConnectionId, ConnectionState, Lifecycle, NextStep};
use super::traits::{Connector, Frame, Handler, Transport};
use super::transport::TungsteniteConnector;
use crate::Result;
use crate::error::Error;
use crate::resolver::Resolve;

/// Manages WebSocket connection lifecycle, reconnection, and heartbeat.
///
/// The manager connects as soon as it is constructed and keeps at most one transport open:
/// - Unexpected closures are retried after a constant delay, up to the configured number of attempts
/// - A `ping` envelope is sent every heartbeat interval while connected
/// - Inbound frames are handed to the [`Handler`] in arrival order
///
/// Dropping the manager is the same as calling [`ConnectionManager::disconnect`].
///
/// # Example
///
/// ```no_run
/// use realtime_socket::ws::{Callbacks, ConnectionManager, Envelope};
/// use realtime_socket::ws::config::Config;
/// use serde_json::json;
///
/// # async fn example() -> realtime_socket::Result<()> {
/// let address = "wss://api.example.com/ws/chat".parse()?;
/// let callbacks = Callbacks::default().message(|envelope| println!("{envelope:?}"));
/// let connection = ConnectionManager::new(address, Config::default(), callbacks)?;
///
/// if !connection.send_message(Envelope::new("chat", json!("hi"))) {
///     println!("not connected yet, message dropped");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<C: Connector = TungsteniteConnector> {
    inner: Arc<Inner<C>>,
}

struct Inner<C: Connector> {
    address: Url,
    config: Config,
    connector: C,
    handler: Box<dyn Handler>,
    /// Guards every transition; the cycle token is cancelled while it is held
    lifecycle: Mutex<Lifecycle>,
    /// Watch channel sender for state changes
    state_tx: watch::Sender<ConnectionState>,
    /// Writer for the currently open transport
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    message_count: AtomicU64,
    last_message: Mutex<Option<Envelope>>,
    cycle: Mutex<Option<Cycle>>,
}

/// One connect-and-retry run, bound to a cancellation token.
struct Cycle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

enum Flow {
    Continue,
    Closed(CloseInfo),
    Failed(Error),
    Cancelled,
}

impl ConnectionManager {
    /// Create a connection manager backed by tokio-tungstenite and start connecting.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new<H: Handler>(address: Url, config: Config, handler: H) -> Result<Self> {
        Self::with_connector(address, config, TungsteniteConnector, handler)
    }

    /// Resolve a logical path such as `/ws/chat` and start connecting.
    pub fn from_path<R, H>(path: &str, resolver: &R, config: Config, handler: H) -> Result<Self>
    where
        R: Resolve + ?Sized,
        H: Handler,
    {
        Self::new(resolver.resolve(path)?, config, handler)
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a connection manager over a custom [`Connector`] and start connecting.
    ///
    /// Fails with [`Kind::Validation`](crate::error::Kind::Validation) for a non-`ws`/`wss`
    /// address or a zero heartbeat interval. Must be called within a Tokio runtime.
    pub fn with_connector<H: Handler>(
        address: Url,
        config: Config,
        connector: C,
        handler: H,
    ) -> Result<Self> {
        if !matches!(address.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "unsupported WebSocket scheme `{}` in {address}",
                address.scheme()
            )));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(Error::validation("heartbeat interval must be non-zero"));
        }

        let lifecycle = Lifecycle::new(config.reconnect.clone());
        let (state_tx, _) = watch::channel(lifecycle.state());

        let inner = Arc::new(Inner {
            address,
            config,
            connector,
            handler: Box::new(handler),
            lifecycle: Mutex::new(lifecycle),
            state_tx,
            outbound: Mutex::new(None),
            message_count: AtomicU64::new(0),
            last_message: Mutex::new(None),
            cycle: Mutex::new(None),
        });
        inner.start();

        Ok(Self { inner })
    }

    /// Resolve a logical path and start connecting over a custom [`Connector`].
    pub fn with_connector_from_path<R, H>(
        path: &str,
        resolver: &R,
        config: Config,
        connector: C,
        handler: H,
    ) -> Result<Self>
    where
        R: Resolve + ?Sized,
        H: Handler,
    {
        Self::with_connector(resolver.resolve(path)?, config, connector, handler)
    }

    /// Send an envelope on the open transport.
    ///
    /// Returns `false` without queueing anything when the connection is not `Connected`.
    /// A missing timestamp is filled in before sending.
    pub fn send_message(&self, mut envelope: Envelope) -> bool {
        let Some(outbound) = self.inner.writer() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(kind = %envelope.kind, state = %self.state(), "Dropping message, not connected");
            return false;
        };

        envelope.stamp();
        let Some(json) = encode(&envelope) else {
            return false;
        };

        if outbound.send(json).is_err() {
            return false;
        }

        self.inner.message_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Wrap `payload` in an envelope of type `kind` (default `"message"`) and send it.
    pub fn send_json_message<T: Serialize + ?Sized>(&self, payload: &T, kind: Option<&str>) -> bool {
        match serde_json::to_value(payload) {
            Ok(data) => self.send_message(Envelope::new(kind.unwrap_or(envelope::MESSAGE), data)),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Unable to serialize payload");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                false
            }
        }
    }

    /// Close the connection and stop all timers.
    ///
    /// No heartbeat or reconnect attempt fires after this returns. Calling it again is a no-op.
    pub fn disconnect(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.disconnect();
        self.inner.state_tx.send_replace(lifecycle.state());
        self.inner.outbound.lock().take();

        if let Some(cycle) = self.inner.cycle.lock().as_ref() {
            cycle.token.cancel();
        }
    }

    /// Tear down the current transport, if any, and connect afresh with a full retry budget.
    ///
    /// Must be called within a Tokio runtime.
    pub fn reconnect(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.restart();
        self.inner.state_tx.send_replace(lifecycle.state());
        self.inner.outbound.lock().take();
        self.inner.start();
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Identifier of the most recent connect attempt.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.lifecycle.lock().connection_id()
    }

    /// Reconnect attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_count(&self) -> u32 {
        self.inner.lifecycle.lock().attempts()
    }

    /// Envelopes sent plus frames received over the manager's lifetime.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.inner.message_count.load(Ordering::Relaxed)
    }

    /// The most recent envelope delivered to [`Handler::on_message`].
    #[must_use]
    pub fn last_message(&self) -> Option<Envelope> {
        self.inner.last_message.lock().clone()
    }

    #[must_use]
    pub fn address(&self) -> &Url {
        &self.inner.address
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<C: Connector> Inner<C> {
    /// Cancel the running cycle, if any, and spawn a new one that waits for it to finish.
    fn start(self: &Arc<Self>) {
        let token = CancellationToken::new();
        let mut cycle = self.cycle.lock();

        let previous = cycle.take().map(|previous| {
            previous.token.cancel();
            previous.task
        });
        let task = tokio::spawn(Arc::clone(self).run(token.clone(), previous));

        *cycle = Some(Cycle { token, task });
    }

    /// Apply `f` unless the cycle owning `token` has been cancelled.
    fn transition<F, R>(&self, token: &CancellationToken, f: F) -> Option<R>
    where
        F: FnOnce(&mut Lifecycle) -> R,
    {
        let mut lifecycle = self.lifecycle.lock();
        if token.is_cancelled() {
            return None;
        }

        let result = f(&mut lifecycle);
        self.state_tx.send_replace(lifecycle.state());
        Some(result)
    }

    fn writer(&self) -> Option<mpsc::UnboundedSender<String>> {
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.state().is_connected() {
            return None;
        }
        self.outbound.lock().clone()
    }

    /// Connect loop with automatic reconnection.
    async fn run(self: Arc<Self>, token: CancellationToken, previous: Option<JoinHandle<()>>) {
        // At most one transport is alive per manager.
        if let Some(previous) = previous {
            _ = previous.await;
        }

        let mut backoff: Constant = (&self.config.reconnect).into();

        loop {
            let Some(id) = self.transition(&token, Lifecycle::begin_connect) else {
                return;
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(%id, address = %self.address, "Connecting");

            let close = match self.open(&token).await {
                None => return,
                Some(Ok(transport)) => match self.session(transport, &token, id).await {
                    Some(close) => close,
                    None => return,
                },
                Some(Err(error)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%id, error = %error, "Unable to connect");
                    if self.fail(&token, &error).is_none() {
                        return;
                    }
                    CloseInfo::abnormal(error.to_string())
                }
            };

            let Some(step) = self.transition(&token, |lifecycle| lifecycle.closed(&close)) else {
                return;
            };

            #[cfg(feature = "tracing")]
            tracing::info!(%id, code = close.code, reason = %close.reason, "Connection closed");
            self.handler.on_close(&close);

            if step == NextStep::Settle {
                #[cfg(feature = "tracing")]
                if !close.is_normal() {
                    tracing::warn!(
                        max_attempts = self.config.reconnect.max_attempts,
                        "Not reconnecting, retry budget exhausted or disabled"
                    );
                }
                return;
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.config.reconnect.interval);

            #[cfg(feature = "tracing")]
            tracing::debug!(delay = ?delay, "Scheduling reconnect");

            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = sleep(delay) => {}
            }

            let Some(attempt) = self.transition(&token, Lifecycle::retry) else {
                return;
            };

            #[cfg(feature = "tracing")]
            tracing::info!(
                attempt,
                max_attempts = self.config.reconnect.max_attempts,
                "Reconnecting"
            );
            self.handler.on_reconnect(attempt);
        }
    }

    /// Open a transport, racing the optional connect timeout and cancellation.
    async fn open(&self, token: &CancellationToken) -> Option<Result<C::Transport>> {
        let connect = async {
            let connect = self
                .connector
                .connect(&self.address, &self.config.protocols);

            match self.config.connect_timeout {
                Some(after) => match timeout(after, connect).await {
                    Ok(result) => result,
                    Err(_elapsed) => Err(WsError::Timeout { after }.into()),
                },
                None => connect.await,
            }
        };

        tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = connect => Some(result),
        }
    }

    /// Drive an open transport until it closes. `None` means the cycle was cancelled.
    async fn session(
        &self,
        mut transport: C::Transport,
        token: &CancellationToken,
        id: ConnectionId,
    ) -> Option<CloseInfo> {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

        let opened = self.transition(token, |lifecycle| {
            lifecycle.opened();
            *self.outbound.lock() = Some(outbound_tx);
        });
        if opened.is_none() {
            self.shutdown(&mut transport).await;
            return None;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(%id, address = %self.address, "Connected");
        #[cfg(not(feature = "tracing"))]
        let _ = id;
        self.handler.on_open();

        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let close = loop {
            let flow = tokio::select! {
                biased;
                () = token.cancelled() => Flow::Cancelled,
                frame = transport.next() => match frame {
                    Some(Ok(Frame::Text(text))) => {
                        self.dispatch(&text);
                        Flow::Continue
                    }
                    Some(Ok(Frame::Close(info))) => Flow::Closed(info),
                    Some(Err(error)) => Flow::Failed(error),
                    None => Flow::Closed(CloseInfo::abnormal("connection dropped")),
                },
                Some(text) = outbound_rx.recv() => tokio::select! {
                    biased;
                    () = token.cancelled() => Flow::Cancelled,
                    sent = transport.send(text) => match sent {
                        Ok(()) => Flow::Continue,
                        Err(error) => Flow::Failed(error),
                    },
                },
                _ = heartbeat.tick() => self.ping(&mut transport, token).await,
            };

            match flow {
                Flow::Continue => {}
                Flow::Closed(info) => break info,
                Flow::Failed(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(%id, error = %error, "WebSocket error");
                    if self.fail(token, &error).is_none() {
                        self.shutdown(&mut transport).await;
                        return None;
                    }
                    break CloseInfo::abnormal(error.to_string());
                }
                Flow::Cancelled => {
                    self.shutdown(&mut transport).await;
                    return None;
                }
            }
        };

        self.outbound.lock().take();
        Some(close)
    }

    /// Send a heartbeat `ping`, abandoning it if the cycle is cancelled mid-send.
    async fn ping(&self, transport: &mut C::Transport, token: &CancellationToken) -> Flow {
        let Some(json) = encode(&Envelope::ping()) else {
            return Flow::Continue;
        };

        let sent = tokio::select! {
            biased;
            () = token.cancelled() => return Flow::Cancelled,
            sent = transport.send(json) => sent,
        };

        match sent {
            Ok(()) => {
                self.message_count.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::trace!("Heartbeat ping sent");
                Flow::Continue
            }
            Err(error) => Flow::Failed(error),
        }
    }

    fn dispatch(&self, raw: &str) {
        self.message_count.fetch_add(1, Ordering::Relaxed);

        let envelope = Envelope::parse(raw);
        if envelope.is_pong() {
            #[cfg(feature = "tracing")]
            tracing::trace!("Heartbeat pong received");
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(kind = %envelope.kind, "Received envelope");

        *self.last_message.lock() = Some(envelope.clone());
        self.handler.on_message(&envelope);
    }

    /// Record a transport error. `None` if the cycle was cancelled meanwhile.
    fn fail(&self, token: &CancellationToken, error: &Error) -> Option<()> {
        self.transition(token, Lifecycle::errored)?;
        self.handler.on_error(error);
        Some(())
    }

    /// Owner-initiated close of a live transport.
    async fn shutdown(&self, transport: &mut C::Transport) {
        self.outbound.lock().take();

        let info = CloseInfo::normal();
        if let Err(e) = transport.close(info.clone()).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "Close handshake failed");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }
        self.handler.on_close(&info);
    }
}

fn encode(envelope: &Envelope) -> Option<String> {
    serde_json::to_string(envelope)
        .inspect_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::error!(kind = %envelope.kind, error = %e, "Unable to serialize envelope");
            #[cfg(not(feature = "tracing"))]
            let _: &serde_json::Error = e;
        })
        .ok()
}
