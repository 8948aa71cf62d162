//! Chat channel walkthrough.
//!
//! Connects to the chat preset, sends a greeting once the connection opens and prints incoming
//! envelopes for a while before disconnecting.
//!
//! Run with tracing enabled:
//! ```sh
//! REALTIME_API_BASE_URL=http://localhost:8000 RUST_LOG=info cargo run --example chat
//! ```

use std::time::Duration;

use realtime_socket::presets::{self, Channel};
use realtime_socket::resolver::BaseUrl;
use realtime_socket::ws::{Callbacks, ConnectionState};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let resolver = BaseUrl::from_env()?;
    let callbacks = Callbacks::default()
        .message(|envelope| info!(kind = %envelope.kind, data = %envelope.data, "Chat message"))
        .reconnect(|attempt| warn!(attempt, "Chat reconnecting"));

    let chat = presets::connect(Channel::Chat, &resolver, callbacks)?;
    info!(address = %chat.address(), "Connecting to chat");

    let mut states = chat.state_receiver();
    let opened = tokio::time::timeout(
        Duration::from_secs(10),
        states.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await;

    if opened.is_ok() {
        let sent = chat.send_json_message(&json!({"room": "general", "body": "hello"}), Some("chat"));
        info!(sent, "Greeting sent");
    } else {
        warn!(state = %chat.state(), "Chat did not connect in time");
    }

    tokio::time::sleep(Duration::from_secs(30)).await;

    info!(
        messages = chat.message_count(),
        last = ?chat.last_message(),
        "Disconnecting"
    );
    chat.disconnect();

    Ok(())
}
