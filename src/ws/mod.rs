//! Core WebSocket infrastructure.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: owns one transport at a time, with heartbeat and reconnection
//! - [`Handler`]: owner callbacks for open, message, error, close and reconnect events
//! - [`Connector`] / [`Transport`]: the seam the manager opens transports through
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(address, Config::default(), MyHandler)?;
//! connection.send_json_message(&json!({"body": "hi"}), Some("chat"));
//! connection.disconnect();
//! ```

pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod state;
pub mod traits;
pub mod transport;

pub use connection::ConnectionManager;
pub use envelope::Envelope;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use state::{CloseInfo, ConnectionId, ConnectionState};
pub use traits::*;
pub use transport::TungsteniteConnector;
