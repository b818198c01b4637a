//! Hub error taxonomy. Every variant is contained to one connection or one channel.

use shared::Channel;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Producer sent no key or the wrong key. The connection is closed.
    #[error("producer key missing or incorrect")]
    Authentication,

    /// Producer frame could not be decoded. The frame is dropped.
    #[error("malformed producer message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// One channel's payload could not be derived. Its cache is left as is.
    #[error("deriving {channel} payload: {source}")]
    Derivation {
        channel: Channel,
        #[source]
        source: anyhow::Error,
    },

    /// Sending to one subscriber failed. That subscriber is closed.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}
