//! WebSocket route handlers.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, Stream, StreamExt};
use shared::Channel;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::HubError;
use crate::relay::{Connection, Inbound};

pub async fn poller_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_producer(socket, state))
}

pub async fn printers_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    subscribe(ws, state, Channel::Printers)
}

pub async fn sign_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    subscribe(ws, state, Channel::Sign)
}

pub async fn hours_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    subscribe(ws, state, Channel::Hours)
}

fn subscribe(ws: WebSocketUpgrade, state: AppState, channel: Channel) -> Response {
    ws.on_upgrade(move |socket| handle_subscriber(socket, state, channel))
}

/// Split an upgraded socket into a hub connection (outbound text) and its inbound frames.
fn attach(
    socket: WebSocket,
    channel: Channel,
) -> (
    Arc<Connection>,
    impl Stream<Item = Result<Inbound, axum::Error>> + Unpin,
) {
    let (ws_tx, ws_rx) = socket.split();
    let sink = ws_tx
        .with(|text: String| async move { Ok::<_, axum::Error>(Message::Text(text.into())) })
        .sink_map_err(|e| HubError::Delivery(e.to_string()));
    let inbound = ws_rx.map(|msg| msg.map(inbound_frame));
    (Connection::new(channel, sink), inbound)
}

fn inbound_frame(msg: Message) -> Inbound {
    match msg {
        Message::Text(text) => Inbound::Text(text.as_str().to_owned()),
        Message::Close(_) => Inbound::Close,
        _ => Inbound::Other,
    }
}

async fn handle_producer(socket: WebSocket, state: AppState) {
    let (conn, inbound) = attach(socket, Channel::Poller);
    state.hub.run_producer(Arc::clone(&conn), inbound).await;
    conn.shutdown().await;
}

async fn handle_subscriber(socket: WebSocket, state: AppState, channel: Channel) {
    let (conn, inbound) = attach(socket, channel);
    state.hub.run_subscriber(Arc::clone(&conn), inbound).await;
    conn.shutdown().await;
}
