//! Error kinds shared across the store, engine and dispatcher.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared store is unreachable or mid-reconnect; retry next tick.
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
    /// A stored value did not parse back into its expected shape.
    #[error("malformed value under {key}: {detail}")]
    Malformed { key: String, detail: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Status flipped to "matched" between enqueue and scan.
    #[error("participant {0} was matched concurrently")]
    AlreadyMatched(Uuid),
    /// Round queue is at the configured capacity.
    #[error("round {0} queue is full")]
    QueueFull(u32),
    /// A pair attempt named the same participant on both sides.
    #[error("self-match attempted for participant {0}")]
    SelfMatch(Uuid),
}
