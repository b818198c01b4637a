//! WebSocket client that pushes reports to the hub.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use shared::ProducerReport;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::{encode_frame, read_state_file};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type HubSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Push the state file every `interval` forever, reconnecting after any failure.
pub async fn run_ws_client(
    ws_url: &str,
    api_key: &str,
    state_file: &Path,
    interval: Duration,
) -> Result<()> {
    loop {
        match connect_async(ws_url).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to hub at {}", ws_url);
                if let Err(e) = push_reports(ws, api_key, state_file, interval).await {
                    tracing::warn!("Connection error: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn push_reports(
    ws: HubSocket,
    api_key: &str,
    state_file: &Path,
    interval: Duration,
) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = match read_state_file(state_file).await {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping report");
                        continue;
                    }
                };
                ws_tx.send(Message::Text(encode_frame(api_key, report)?)).await?;
                tracing::debug!("report sent");
            }
            msg = ws_rx.next() => match msg {
                // The hub only closes on us: bad key, superseded, or shutting down.
                Some(Ok(Message::Close(frame))) => anyhow::bail!("hub closed the connection: {:?}", frame),
                None => anyhow::bail!("hub connection ended"),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Connect, send one report, and close.
pub async fn send_once(ws_url: &str, api_key: &str, report: ProducerReport) -> Result<()> {
    let (mut ws, _) = connect_async(ws_url).await?;
    ws.send(Message::Text(encode_frame(api_key, report)?)).await?;
    // The report is already flushed; a peer that hangs up first is fine.
    if let Err(e) = ws.close(None).await {
        tracing::debug!(error = %e, "close after report failed");
    }
    Ok(())
}
