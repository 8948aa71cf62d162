//! Notifications listener.
//!
//! Keeps the notifications preset open until Ctrl-C, logging every notification and every state
//! change. Stop the server to watch the slow retry schedule.
//!
//! ```sh
//! RUST_LOG=info,realtime_socket=debug cargo run --example notifications
//! ```

use realtime_socket::presets::{self, Channel};
use realtime_socket::resolver::BaseUrl;
use realtime_socket::ws::Callbacks;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let resolver = BaseUrl::from_env()?;
    let callbacks = Callbacks::default()
        .message(|envelope| info!(kind = %envelope.kind, data = %envelope.data, "Notification"));

    let notifications = presets::connect(Channel::Notifications, &resolver, callbacks)?;
    let mut states = notifications.state_receiver();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(state = %*states.borrow_and_update(), "State changed");
            }
        }
    }

    notifications.disconnect();
    info!(messages = notifications.message_count(), "Stopped");

    Ok(())
}
