//! Seams between the connection manager, its owner and the transport.

use async_trait::async_trait;
use url::Url;

use super::envelope::Envelope;
use super::state::CloseInfo;
use crate::Result;
use crate::error::Error;

/// Owner callbacks.
///
/// Every hook is optional. Hooks run on the manager task, one at a time and in the order the
/// events happened, so they must not block.
pub trait Handler: Send + Sync + 'static {
    /// The transport opened.
    fn on_open(&self) {}

    /// An envelope arrived. Heartbeat `pong`s are not delivered.
    fn on_message(&self, envelope: &Envelope) {
        let _ = envelope;
    }

    /// The transport reported an error. A close event follows.
    fn on_error(&self, error: &Error) {
        let _ = error;
    }

    /// The transport closed.
    fn on_close(&self, info: &CloseInfo) {
        let _ = info;
    }

    /// The reconnect delay elapsed and attempt `attempt` is starting.
    fn on_reconnect(&self, attempt: u32) {
        let _ = attempt;
    }
}

impl Handler for () {}

/// A single inbound frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close(CloseInfo),
}

/// An open, full-duplex message transport.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Transmit one text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound frame, `None` once the stream has ended.
    ///
    /// Must be cancel safe: the manager polls it inside `select!`.
    async fn next(&mut self) -> Option<Result<Frame>>;

    /// Initiate a closing handshake.
    async fn close(&mut self, info: CloseInfo) -> Result<()>;
}

/// Opens transports for a manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    async fn connect(&self, address: &Url, protocols: &[String]) -> Result<Self::Transport>;
}

type Hook<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Closure-based [`Handler`].
///
/// ```
/// use realtime_socket::ws::Callbacks;
///
/// let callbacks = Callbacks::default()
///     .open(|| println!("open"))
///     .message(|envelope| println!("{}", envelope.kind));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct Callbacks {
    open: Option<Box<dyn Fn() + Send + Sync>>,
    message: Option<Hook<Envelope>>,
    error: Option<Hook<Error>>,
    close: Option<Hook<CloseInfo>>,
    reconnect: Option<Box<dyn Fn(u32) + Send + Sync>>,
}

impl Callbacks {
    #[must_use]
    pub fn open<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.open = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn message<F: Fn(&Envelope) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn error<F: Fn(&Error) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn close<F: Fn(&CloseInfo) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.close = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn reconnect<F: Fn(u32) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.reconnect = Some(Box::new(f));
        self
    }
}

impl Handler for Callbacks {
    fn on_open(&self) {
        if let Some(f) = &self.open {
            f();
        }
    }

    fn on_message(&self, envelope: &Envelope) {
        if let Some(f) = &self.message {
            f(envelope);
        }
    }

    fn on_error(&self, error: &Error) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    fn on_close(&self, info: &CloseInfo) {
        if let Some(f) = &self.close {
            f(info);
        }
    }

    fn on_reconnect(&self, attempt: u32) {
        if let Some(f) = &self.reconnect {
            f(attempt);
        }
    }
}
