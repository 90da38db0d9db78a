use std::time::Duration;

use thiserror::Error;

/// Failures reported by a broker adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("exchange not found: {0}")]
    ExchangeNotFound(String),

    /// Publish target is neither a declared queue nor a declared exchange.
    #[error("no queue or exchange named {0}")]
    UnknownAddress(String),

    /// Ack/reject of a delivery that is not outstanding (already settled or never issued).
    #[error("unknown delivery tag {0}")]
    UnknownDelivery(u64),

    #[error("broker state poisoned during {0}")]
    Poisoned(&'static str),
}

/// Errors surfaced by the bus and the dispatcher.
#[derive(Debug, Error)]
pub enum BusError {
    /// A payload could not be encoded or decoded (also reported for poison requests).
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The remote handler failed terminally for this request.
    #[error("handler failed: {0}")]
    Handler(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No correlated reply arrived before the deadline.
    #[error("request {message_type} timed out after {timeout:?}")]
    RequestTimedOut {
        message_type: String,
        timeout: Duration,
    },

    #[error("duplicate handler for {0}")]
    DuplicateHandler(String),

    #[error("worker count must be at least 1 for {0}")]
    InvalidWorkerCount(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl BusError {
    /// True for [`BusError::RequestTimedOut`]; callers may retry the request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::RequestTimedOut { .. })
    }
}
