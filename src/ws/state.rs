//! Connection lifecycle state machine.
//!
//! [`Lifecycle`] holds no I/O. The driver in [`super::connection`] feeds it transport events
//! and acts on the [`NextStep`] it returns.

use std::fmt;

use uuid::Uuid;

use super::config::ReconnectConfig;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening a transport
    Connecting,
    /// Transport open and heartbeat running
    Connected,
    /// Settled; nothing happens until the owner calls `reconnect()`
    Disconnected,
    /// The transport reported an error; a close event follows
    Error,
    /// Waiting out the delay before the next attempt
    Reconnecting,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Error => write!(f, "Error"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// Identifier minted for every connect attempt. Only meant for correlating logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Close code and reason reported when a transport closes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// A close frame arrived without a status code.
    pub const NO_STATUS: u16 = 1005;
    /// The transport went away without a close frame, or never opened.
    pub const ABNORMAL: u16 = 1006;

    pub fn new<S: Into<String>>(code: u16, reason: S) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn normal() -> Self {
        Self::new(Self::NORMAL, "")
    }

    pub fn abnormal<S: Into<String>>(reason: S) -> Self {
        Self::new(Self::ABNORMAL, reason)
    }

    #[must_use]
    pub fn no_status() -> Self {
        Self::new(Self::NO_STATUS, "")
    }

    #[must_use]
    pub const fn is_normal(&self) -> bool {
        self.code == Self::NORMAL
    }
}

/// What the driver does after a close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextStep {
    /// Wait the reconnect delay, then call [`Lifecycle::retry`].
    Reconnect,
    /// Stay in `Disconnected`.
    Settle,
}

/// Connection state plus the counters that drive transitions.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: ConnectionState,
    attempts: u32,
    connection_id: Option<ConnectionId>,
    policy: ReconnectConfig,
}

impl Lifecycle {
    pub(crate) fn new(policy: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempts: 0,
            connection_id: None,
            policy,
        }
    }

    pub(crate) const fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) const fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    /// A transport is about to be opened.
    pub(crate) fn begin_connect(&mut self) -> ConnectionId {
        let id = ConnectionId::generate();
        self.state = ConnectionState::Connecting;
        self.connection_id = Some(id);
        id
    }

    /// The transport opened; the retry budget starts over.
    pub(crate) fn opened(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
    }

    pub(crate) fn errored(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Error;
        }
    }

    /// The transport closed. A close seen while `Disconnected` came from an owner-initiated
    /// disconnect and never reconnects.
    pub(crate) fn closed(&mut self, info: &CloseInfo) -> NextStep {
        if self.state == ConnectionState::Disconnected || info.is_normal() {
            self.state = ConnectionState::Disconnected;
            return NextStep::Settle;
        }

        if self.policy.allows(self.attempts) {
            self.state = ConnectionState::Reconnecting;
            NextStep::Reconnect
        } else {
            self.state = ConnectionState::Disconnected;
            NextStep::Settle
        }
    }

    /// The reconnect delay elapsed. Returns the attempt number.
    pub(crate) fn retry(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.state = ConnectionState::Connecting;
        self.attempts
    }

    pub(crate) fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Owner-requested reconnect: forget earlier failures and start over.
    pub(crate) fn restart(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Connecting;
    }
}
