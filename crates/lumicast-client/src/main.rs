//! lumicast tail console.
//!
//! Connects to the configured hub/group and prints every decoded command
//! batch, which is all a field tech needs to watch a kiosk installation
//! talk. Reconnection is deliberately manual: run it again.

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use lumicast_client::negotiate::StaticNegotiate;
use lumicast_client::session::{GroupSession, SessionOptions};
use lumicast_client::transport::ws::WsTransport;
use lumicast_client::config;
use lumicast_core::protocol::command::Message;

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lumicast.yaml".to_string());
    let cfg = config::load_from_file(&path).expect("config load failed");

    let negotiate = Arc::new(StaticNegotiate::new(cfg.endpoint.clone()));
    let session = GroupSession::new(
        SessionOptions::from(&cfg),
        negotiate,
        Arc::new(WsTransport::new()),
    );

    let mut events = session.subscribe();
    session.connect().await.expect("connect failed");
    tracing::info!(
        hub = %session.hub(),
        group = %session.group(),
        connection_id = session.connection_id().as_deref().unwrap_or(""),
        "tailing group traffic, ctrl-c to quit"
    );

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(envelope) => match Message::from_group(&envelope) {
                        Ok(msg) if !msg.text.is_empty() => {
                            println!("[{}] {}", msg.user, msg.text);
                        }
                        Ok(msg) => {
                            for cmd in &msg.commands {
                                println!(
                                    "[{}] {} target={} colors={} pixels={}",
                                    msg.user,
                                    cmd.command,
                                    cmd.target,
                                    cmd.colors.len(),
                                    cmd.pixels.len()
                                );
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "payload decode failed"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
        if !session.is_connected() {
            break;
        }
    }

    session.close().await;
    let counters = session.counters();
    tracing::info!(?counters, "session closed");
}
