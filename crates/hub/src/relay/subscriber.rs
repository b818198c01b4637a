//! Subscriber session: join, wait for disconnect, leave.

use std::fmt::Display;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use super::connection::{Connection, Inbound};
use super::Hub;

impl Hub {
    /// Drive an outbound-channel connection. Inbound frames are ignored; the
    /// loop only watches for disconnection. Leaves the registry on every exit.
    pub async fn run_subscriber<S, E>(&self, conn: Arc<Connection>, mut inbound: S)
    where
        S: Stream<Item = Result<Inbound, E>> + Unpin,
        E: Display,
    {
        let Some(_membership) = self.join(&conn) else {
            tracing::debug!(conn = %conn.id(), channel = %conn.channel(), "join refused");
            conn.close();
            return;
        };
        loop {
            let next = tokio::select! {
                msg = inbound.next() => msg,
                _ = conn.closed() => break,
            };
            match next {
                Some(Ok(Inbound::Close)) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(conn = %conn.id(), error = %e, "subscriber receive error");
                    break;
                }
            }
        }
    }
}
