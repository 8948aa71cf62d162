//! Fixed configurations for the platform's real-time channels.
//!
//! Chat retries quickly but gives up soon, notifications retry slowly for a long time and
//! presence retries slowly a few times. Each preset also logs its channel's events.

use std::fmt;
use std::time::Duration;

use crate::Result;
use crate::error::Error;
use crate::resolver::Resolve;
use crate::ws::config::{Config, ReconnectConfig};
use crate::ws::{CloseInfo, ConnectionManager, Envelope, Handler};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A real-time channel with its own path and reconnection policy.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Chat,
    Notifications,
    Presence,
}

struct Preset {
    path: &'static str,
    max_attempts: u32,
    interval: Duration,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Chat, Channel::Notifications, Channel::Presence];

    const fn preset(self) -> Preset {
        match self {
            Channel::Chat => Preset {
                path: "/ws/chat",
                max_attempts: 5,
                interval: Duration::from_secs(1),
            },
            Channel::Notifications => Preset {
                path: "/ws/notifications",
                max_attempts: 10,
                interval: Duration::from_secs(5),
            },
            Channel::Presence => Preset {
                path: "/ws/presence",
                max_attempts: 3,
                interval: Duration::from_secs(10),
            },
        }
    }

    /// Logical path resolved against the API base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        self.preset().path
    }

    #[must_use]
    pub fn config(self) -> Config {
        let preset = self.preset();
        Config::builder()
            .heartbeat_interval(HEARTBEAT_INTERVAL)
            .reconnect(
                ReconnectConfig::builder()
                    .max_attempts(preset.max_attempts)
                    .interval(preset.interval)
                    .build(),
            )
            .build()
    }

    /// Logging handler for this channel, forwarding to `owner` if given.
    #[must_use]
    pub fn logger(self, owner: Option<Box<dyn Handler>>) -> ChannelLogger {
        ChannelLogger {
            channel: self,
            owner,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Chat => write!(f, "chat"),
            Channel::Notifications => write!(f, "notifications"),
            Channel::Presence => write!(f, "presence"),
        }
    }
}

/// Connect `channel` through `resolver`, logging its events and forwarding them to `handler`.
///
/// Must be called within a Tokio runtime.
pub fn connect<R, H>(channel: Channel, resolver: &R, handler: H) -> Result<ConnectionManager>
where
    R: Resolve + ?Sized,
    H: Handler,
{
    ConnectionManager::from_path(
        channel.path(),
        resolver,
        channel.config(),
        channel.logger(Some(Box::new(handler))),
    )
}

/// [`Handler`] that records a channel's events as `tracing` events.
pub struct ChannelLogger {
    channel: Channel,
    owner: Option<Box<dyn Handler>>,
}

impl ChannelLogger {
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl Handler for ChannelLogger {
    fn on_open(&self) {
        #[cfg(feature = "tracing")]
        tracing::info!(channel = %self.channel, "Channel connected");

        if let Some(owner) = &self.owner {
            owner.on_open();
        }
    }

    fn on_message(&self, envelope: &Envelope) {
        #[cfg(feature = "tracing")]
        tracing::debug!(channel = %self.channel, kind = %envelope.kind, "Channel message");

        if let Some(owner) = &self.owner {
            owner.on_message(envelope);
        }
    }

    fn on_error(&self, error: &Error) {
        #[cfg(feature = "tracing")]
        tracing::error!(channel = %self.channel, error = %error, "Channel error");

        if let Some(owner) = &self.owner {
            owner.on_error(error);
        }
    }

    fn on_close(&self, info: &CloseInfo) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            channel = %self.channel,
            code = info.code,
            reason = %info.reason,
            "Channel closed"
        );

        if let Some(owner) = &self.owner {
            owner.on_close(info);
        }
    }

    fn on_reconnect(&self, attempt: u32) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            channel = %self.channel,
            attempt,
            max_attempts = self.channel.preset().max_attempts,
            "Channel reconnecting"
        );

        if let Some(owner) = &self.owner {
            owner.on_reconnect(attempt);
        }
    }
}
