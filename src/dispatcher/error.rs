//! Errors returned by message handlers.

use std::error::Error;

use thiserror::Error;

use crate::envelope::{ErrorInfo, ErrorKind};
use crate::error::BusError;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload does not decode into the bound type. Never retried.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The response does not encode with the bus codec. Never retried.
    #[error("encode failed: {0}")]
    EncodeFailed(String),

    /// Business logic rejected the message.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    /// A bus call made from inside the handler failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("handler error: {0}")]
    Other(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }

    /// Whether redelivering the same message could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            HandlerError::DecodeFailed(_) | HandlerError::EncodeFailed(_)
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::DecodeFailed(_) | HandlerError::EncodeFailed(_) => {
                ErrorKind::Deserialization
            }
            _ => ErrorKind::Handler,
        }
    }

    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.kind(), self.to_string())
    }
}

/// JSON work done inside a handler; the inbound payload itself already decoded.
impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Other(Box::new(err))
    }
}
