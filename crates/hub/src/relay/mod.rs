//! WebSocket relay state: subscriber registry, last-value cache and fan-out.

mod cache;
mod connection;
mod dispatch;
mod keepalive;
mod producer;
mod registry;
mod subscriber;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, Mutex};

use shared::Channel;

pub use cache::{CachedPayload, LastValueCache, NEUTRAL_PAYLOAD};
pub use connection::{ConnState, Connection, FanoutSend, Inbound, TextSink};
pub use dispatch::{dispatch, DispatchReport};
pub use keepalive::spawn_keepalive;
pub use producer::IngestOutcome;
pub use registry::{ChannelRegistry, Membership};

use crate::config::Config;
use crate::derive::Deriver;

/// The broadcast hub. One per process, shared behind an `Arc`.
pub struct Hub {
    config: Arc<Config>,
    registry: Arc<ChannelRegistry>,
    cache: Arc<LastValueCache>,
    deriver: Deriver,
    /// Serialises producer ingestion so cache updates are totally ordered.
    ingest_lock: tokio::sync::Mutex<()>,
    active_producer: Mutex<Option<Arc<Connection>>>,
}

impl Hub {
    pub fn new(config: Arc<Config>, deriver: Deriver) -> Self {
        let cache = Arc::new(LastValueCache::new(config.staleness));
        Self {
            config,
            registry: Arc::new(ChannelRegistry::new()),
            cache,
            deriver,
            ingest_lock: tokio::sync::Mutex::new(()),
            active_producer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<LastValueCache> {
        &self.cache
    }

    /// Register a subscriber and start its keepalive. `None` if the connection
    /// is inbound-only or already closed.
    pub fn join(&self, conn: &Arc<Connection>) -> Option<Membership> {
        if !conn.channel().is_outbound() || !conn.mark_open() || !self.registry.join(conn) {
            return None;
        }
        tracing::info!(
            conn = %conn.id(),
            channel = %conn.channel(),
            subscribers = self.registry.len(conn.channel()),
            "subscriber joined"
        );
        spawn_keepalive(
            Arc::clone(conn),
            Arc::clone(&self.cache),
            self.config.keepalive,
        );
        Some(Membership::new(Arc::clone(&self.registry), Arc::clone(conn)))
    }

    /// Fan the current payload for `channel` out to its subscribers.
    pub async fn dispatch(&self, channel: Channel) -> DispatchReport {
        let payload = self.cache.poller_json_to_str(channel);
        dispatch(&self.registry, channel, payload, self.config.fanout_budget).await
    }
}
