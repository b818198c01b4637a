//! Last-value cache with a staleness window.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use shared::Channel;
use tokio::time::Instant;

/// Served in place of any payload that is missing or stale.
pub const NEUTRAL_PAYLOAD: &str = "{}";

/// Most recent serialized payload for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub channel: Channel,
    pub serialized: String,
    pub computed_at: Instant,
}

/// One slot per outbound channel plus the time of the last authenticated producer contact.
pub struct LastValueCache {
    slots: [Mutex<Option<CachedPayload>>; Channel::OUTBOUND.len()],
    last_contact: Mutex<Option<Instant>>,
    staleness: Duration,
}

impl LastValueCache {
    pub fn new(staleness: Duration) -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(None)),
            last_contact: Mutex::new(None),
            staleness,
        }
    }

    /// Record authenticated contact now. Returns whether the previous contact
    /// was still inside the staleness window.
    pub fn touch(&self) -> bool {
        let mut last = self
            .last_contact
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let was_fresh = last.is_some_and(|t| now.duration_since(t) <= self.staleness);
        *last = Some(now);
        was_fresh
    }

    pub fn last_contact(&self) -> Option<Instant> {
        *self
            .last_contact
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_fresh(&self) -> bool {
        self.last_contact()
            .is_some_and(|t| Instant::now().duration_since(t) <= self.staleness)
    }

    /// Store `serialized` if it differs from the cached bytes, or if `force` is set.
    /// Returns true when the slot was written.
    pub fn update_if_changed(&self, channel: Channel, serialized: String, force: bool) -> bool {
        let Some(i) = channel.slot() else {
            return false;
        };
        let mut slot = self.slots[i].lock().unwrap_or_else(PoisonError::into_inner);
        let unchanged = slot
            .as_ref()
            .is_some_and(|cached| cached.serialized == serialized);
        if unchanged && !force {
            return false;
        }
        *slot = Some(CachedPayload {
            channel,
            serialized,
            computed_at: Instant::now(),
        });
        true
    }

    /// Raw cached entry, ignoring staleness.
    pub fn get(&self, channel: Channel) -> Option<CachedPayload> {
        let i = channel.slot()?;
        self.slots[i]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The payload a subscriber of `channel` should see right now: the cached
    /// value while producer contact is fresh, the neutral payload otherwise.
    pub fn poller_json_to_str(&self, channel: Channel) -> String {
        if !self.is_fresh() {
            return NEUTRAL_PAYLOAD.to_string();
        }
        self.get(channel)
            .map(|cached| cached.serialized)
            .unwrap_or_else(|| NEUTRAL_PAYLOAD.to_string())
    }
}
