//! Per-channel subscriber sets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use shared::Channel;
use uuid::Uuid;

use super::connection::Connection;

type Slot = Mutex<HashMap<Uuid, Arc<Connection>>>;

/// Open subscriber connections, one locked set per outbound channel.
pub struct ChannelRegistry {
    slots: [Slot; Channel::OUTBOUND.len()],
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }

    fn slot(&self, channel: Channel) -> Option<&Slot> {
        channel.slot().map(|i| &self.slots[i])
    }

    /// Register `conn` under its own channel. False for the inbound channel,
    /// a closed connection, or a duplicate join.
    pub fn join(&self, conn: &Arc<Connection>) -> bool {
        let Some(slot) = self.slot(conn.channel()) else {
            return false;
        };
        let mut subscribers = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if conn.is_closed() || subscribers.contains_key(&conn.id()) {
            return false;
        }
        subscribers.insert(conn.id(), Arc::clone(conn));
        true
    }

    /// Remove `conn`. True only for the call that actually removed it.
    pub fn leave(&self, conn: &Connection) -> bool {
        let Some(slot) = self.slot(conn.channel()) else {
            return false;
        };
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conn.id())
            .is_some()
    }

    /// Current subscribers of `channel`.
    pub fn snapshot(&self, channel: Channel) -> Vec<Arc<Connection>> {
        match self.slot(channel) {
            Some(slot) => slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.slot(channel)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry membership held by a subscriber session. Dropping it closes the
/// connection and leaves the registry, whichever way the session ended.
pub struct Membership {
    registry: Arc<ChannelRegistry>,
    conn: Arc<Connection>,
}

impl Membership {
    pub(crate) fn new(registry: Arc<ChannelRegistry>, conn: Arc<Connection>) -> Self {
        Self { registry, conn }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.conn.close();
        if self.registry.leave(&self.conn) {
            tracing::info!(conn = %self.conn.id(), channel = %self.conn.channel(), "subscriber left");
        }
    }
}
