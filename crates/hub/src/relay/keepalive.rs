//! Periodic resend of the cached payload so idle subscribers are never dropped by proxies.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::cache::LastValueCache;
use super::connection::Connection;

/// Start the keepalive loop for `conn`. Sends immediately, then every `period`,
/// until the connection is closed.
pub fn spawn_keepalive(
    conn: Arc<Connection>,
    cache: Arc<LastValueCache>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = conn.closed() => break,
                _ = ticker.tick() => {}
            }
            if !conn.is_open() {
                break;
            }
            let payload = cache.poller_json_to_str(conn.channel());
            let sent = tokio::select! {
                res = conn.send(payload) => res,
                _ = conn.closed() => break,
            };
            if let Err(e) = sent {
                tracing::debug!(conn = %conn.id(), error = %e, "keepalive send failed");
                break;
            }
        }
        tracing::trace!(conn = %conn.id(), "keepalive stopped");
    })
}
