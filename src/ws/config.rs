#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_INTERVAL_DURATION: Duration = Duration::from_secs(3);
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Configuration for WebSocket client behavior.
///
/// ```
/// use std::time::Duration;
///
/// use realtime_socket::ws::config::{Config, ReconnectConfig};
///
/// let config = Config::builder()
///     .protocols(vec!["v1.chat".to_owned()])
///     .heartbeat_interval(Duration::from_secs(15))
///     .reconnect(ReconnectConfig::builder().max_attempts(3).build())
///     .build();
///
/// assert_eq!(config.reconnect.max_attempts, 3);
/// assert!(config.reconnect.enabled);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Sub-protocols offered in the `Sec-WebSocket-Protocol` header
    #[builder(default)]
    pub protocols: Vec<String>,
    /// Interval between `ping` envelopes while connected
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Upper bound for opening the transport. `None` leaves it to the transport.
    pub connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocols: Vec::new(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_DURATION,
            reconnect: ReconnectConfig::default(),
            connect_timeout: None,
        }
    }
}

/// Configuration for automatic reconnection behavior.
///
/// The delay between attempts is constant.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Whether unexpected closures trigger reconnection at all
    #[builder(default = true)]
    pub enabled: bool,
    /// Maximum number of reconnection attempts before settling into `Disconnected`
    #[builder(default = DEFAULT_RECONNECT_ATTEMPTS)]
    pub max_attempts: u32,
    /// Delay before every reconnection attempt
    #[builder(default = DEFAULT_RECONNECT_INTERVAL_DURATION)]
    pub interval: Duration,
}

impl ReconnectConfig {
    /// Reconnection switched off entirely.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `attempts` have already been made.
    #[must_use]
    pub const fn allows(&self, attempts: u32) -> bool {
        self.enabled && attempts < self.max_attempts
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            interval: DEFAULT_RECONNECT_INTERVAL_DURATION,
        }
    }
}

impl From<&ReconnectConfig> for Constant {
    fn from(config: &ReconnectConfig) -> Self {
        Constant::new(config.interval)
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn backoff_is_constant() {
        let config = ReconnectConfig::builder()
            .interval(Duration::from_millis(250))
            .build();
        let mut backoff: Constant = (&config).into();

        for _ in 0..5 {
            assert_eq!(
                backoff.next_backoff(),
                Some(Duration::from_millis(250)),
                "every attempt should wait the same interval"
            );
        }
    }

    #[test]
    fn allows_respects_budget_and_flag() {
        let config = ReconnectConfig::builder().max_attempts(2).build();
        assert!(config.allows(0), "first retry allowed");
        assert!(config.allows(1), "second retry allowed");
        assert!(!config.allows(2), "budget exhausted");

        let zero = ReconnectConfig::builder().max_attempts(0).build();
        assert!(!zero.allows(0), "zero budget never retries");

        assert!(!ReconnectConfig::disabled().allows(0), "disabled never retries");
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.interval, Duration::from_secs(3));
        assert!(config.protocols.is_empty(), "no sub-protocols by default");
        assert!(config.connect_timeout.is_none(), "no connect timeout by default");

        let built = Config::builder().build();
        assert_eq!(built.heartbeat_interval, config.heartbeat_interval);
        assert_eq!(built.reconnect.max_attempts, config.reconnect.max_attempts);
    }
}
