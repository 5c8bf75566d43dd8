//! `coord` — command-line monitor for coordinator sessions.
//!
//! Connects to a session, visualization, or per-agent channel and prints
//! every event frame to stdout as one JSON line.

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing::Level;

use coord_client::{ClientConfig, RealtimeClient};
use coord_core::events::{reserved, EventType};
use coord_core::ids::{AgentId, ClientId, SessionId};
use coord_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "coord", about = "Monitor a coordinator session over WebSocket")]
struct Cli {
    /// Base WebSocket URL of the coordinator backend.
    #[arg(long, default_value = "ws://127.0.0.1:9091/ws")]
    url: String,

    /// Session to attach to.
    #[arg(long)]
    session: String,

    /// Monitor a single agent instead of the general session channel.
    #[arg(long, conflicts_with = "visualization")]
    agent: Option<String>,

    /// Attach to the visualization channel with its fixed subscription set.
    #[arg(long)]
    visualization: bool,

    /// Additional event types to subscribe to. Repeatable.
    #[arg(long = "subscribe", value_name = "EVENT_TYPE")]
    subscriptions: Vec<String>,

    /// Authentication token appended to the connection URL.
    #[arg(long)]
    token: Option<String>,

    /// Client identity to present; omitted, the server assigns one.
    #[arg(long)]
    client_id: Option<String>,

    /// Default log level (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        log_level: cli.log_level,
        module_levels: Vec::new(),
        json_output: cli.json_logs,
    });

    let config = ClientConfig {
        client_id: cli.client_id.map(ClientId::from_raw),
        token: cli.token.map(SecretString::from),
        subscriptions: vet_subscriptions(cli.subscriptions),
        ..ClientConfig::new()
    };

    let session_id = SessionId::from_raw(cli.session);
    let client = if let Some(agent) = cli.agent {
        RealtimeClient::agent(cli.url, session_id, AgentId::from_raw(agent), config)
    } else if cli.visualization {
        RealtimeClient::visualization(cli.url, session_id, config)
    } else {
        RealtimeClient::session(cli.url, session_id, config)
    };

    client.on("connect", |payload| {
        tracing::info!(client_id = ?payload.get("client_id"), "connected");
    });
    client.on("disconnect", |payload| {
        tracing::warn!(
            code = ?payload.get("code"),
            reason = ?payload.get("reason"),
            "disconnected"
        );
    });
    client.on("error", |payload| {
        tracing::error!(detail = %payload, "connection error");
    });
    client.on("message", |payload| {
        println!("{payload}");
    });

    tracing::info!(
        session = %client.endpoint().session_id(),
        endpoint = %client.endpoint().path(),
        "connecting"
    );
    client
        .connect()
        .await
        .context("failed to establish connection")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;
    tracing::info!("shutting down");
    client.disconnect();

    Ok(())
}

/// Filter `--subscribe` values: reserved listener names are not subscribable
/// events and get dropped; names outside the known vocabulary pass through
/// (the wire protocol is open-ended) with a warning.
fn vet_subscriptions(requested: Vec<String>) -> Vec<String> {
    let mut subscriptions = Vec::new();
    for event_type in requested {
        if reserved::is_reserved(&event_type) {
            tracing::warn!(%event_type, "reserved listener name, skipping subscription");
            continue;
        }
        if event_type.parse::<EventType>().is_err() {
            tracing::warn!(%event_type, "not a known event type, subscribing anyway");
        }
        subscriptions.push(event_type);
    }
    subscriptions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_are_dropped() {
        let out = vet_subscriptions(vec![
            "task_update".into(),
            "message".into(),
            "connect".into(),
        ]);
        assert_eq!(out, vec!["task_update"]);
    }

    #[test]
    fn unknown_names_pass_through() {
        let out = vet_subscriptions(vec!["custom_evt".into(), "agent_status".into()]);
        assert_eq!(out, vec!["custom_evt", "agent_status"]);
    }
}
