//! One WebSocket peer as seen by the hub: an outbound text sink plus its lifecycle state.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use shared::Channel;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::error::HubError;

/// Outbound half of a connection, already mapped to text frames.
pub type TextSink = Pin<Box<dyn Sink<String, Error = HubError> + Send>>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Connection lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closed,
}

impl ConnState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Inbound frame, reduced to what the hub cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close,
    /// Binary, ping, pong: tolerated and ignored.
    Other,
}

pub struct Connection {
    id: Uuid,
    channel: Channel,
    state: AtomicU8,
    sink: Mutex<TextSink>,
    closed_tx: watch::Sender<bool>,
    /// Set while a fan-out send to this connection is running.
    fanout_busy: AtomicBool,
}

impl Connection {
    pub fn new<S>(channel: Channel, sink: S) -> Arc<Self>
    where
        S: Sink<String, Error = HubError> + Send + 'static,
    {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4(),
            channel,
            state: AtomicU8::new(ConnState::Connecting as u8),
            sink: Mutex::new(Box::pin(sink)),
            closed_tx,
            fanout_busy: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnState::Closed
    }

    /// `Connecting -> Open`. Returns false if the connection was already closed.
    pub fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnState::Connecting as u8,
                ConnState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
            || self.is_open()
    }

    /// Move to `Closed` and wake everything waiting on [`Connection::closed`].
    /// Returns true only for the call that performed the transition.
    pub fn close(&self) -> bool {
        let prev = self.state.swap(ConnState::Closed as u8, Ordering::AcqRel);
        if prev == ConnState::Closed as u8 {
            return false;
        }
        self.closed_tx.send_replace(true);
        true
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives in `self`, so this only errors after drop.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Reserve this connection for one fan-out send. `None` while an earlier
    /// fan-out send is still in flight, so a hung peer holds at most one.
    pub fn claim_fanout(self: &Arc<Self>) -> Option<FanoutSend> {
        self.fanout_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(FanoutSend {
            conn: Arc::clone(self),
        })
    }

    /// Send one text frame. Any sink error closes the connection.
    pub async fn send(&self, text: String) -> Result<(), HubError> {
        if self.is_closed() {
            return Err(HubError::Closed);
        }
        let mut sink = self.sink.lock().await;
        if self.is_closed() {
            return Err(HubError::Closed);
        }
        match sink.send(text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(sink);
                self.close();
                Err(e)
            }
        }
    }

    /// Close and make a bounded attempt to flush a close frame to the peer.
    pub async fn shutdown(&self) {
        self.close();
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
            let mut sink = self.sink.lock().await;
            let _ = sink.close().await;
        })
        .await;
    }
}

/// A claimed fan-out slot. Released on drop, whether the send finished or not.
pub struct FanoutSend {
    conn: Arc<Connection>,
}

impl FanoutSend {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub async fn send(&self, text: String) -> Result<(), HubError> {
        self.conn.send(text).await
    }
}

impl Drop for FanoutSend {
    fn drop(&mut self) {
        self.conn.fanout_busy.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("state", &self.state())
            .finish()
    }
}
