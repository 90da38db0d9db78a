//! The unit of transfer between the bus, the broker and the dispatcher.

use std::fmt;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::Codec;
use crate::error::BusError;
use crate::message::Message;

/// Why a message failed, carried on dead-lettered messages and error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The payload could not be decoded into the bound type.
    Deserialization,
    /// The handler returned an error (or panicked).
    Handler,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The error a blocked `send` caller sees for this failure.
    pub fn into_bus_error(self) -> BusError {
        match self.kind {
            ErrorKind::Deserialization => BusError::Deserialization(self.message),
            ErrorKind::Handler => BusError::Handler(self.message),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// A message on the wire.
///
/// Only `retry_attempts` (by the dispatcher) and `delivery_count` (by the
/// broker) change after the envelope is first published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub message_type: String,
    pub payload: Vec<u8>,
    pub codec: Codec,
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
    pub retry_attempts: u32,
    pub delivery_count: u32,
    pub expires_at: Option<SystemTime>,
    pub error: Option<ErrorInfo>,
    pub headers: Vec<(String, String)>,
}

impl Envelope {
    pub fn new(message_type: impl Into<String>, codec: Codec, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            payload,
            codec,
            reply_to: None,
            correlation_id: None,
            retry_attempts: 0,
            delivery_count: 0,
            expires_at: None,
            error: None,
            headers: Vec::new(),
        }
    }

    /// Encode a typed message.
    pub fn encode<T: Message>(codec: Codec, message: &T) -> Result<Self, BusError> {
        Ok(Self::new(T::TYPE, codec, codec.encode(message)?))
    }

    /// Decode the payload with the codec that produced it.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        self.codec.decode(&self.payload)
    }

    /// Build the successful reply to this request.
    pub fn reply<R: Serialize>(&self, body: &R) -> Result<Envelope, BusError> {
        let payload = self.codec.encode(body)?;
        Ok(Envelope::new(format!("{}.response", self.message_type), self.codec, payload)
            .with_correlation_id(self.correlation_key()))
    }

    /// Build the error reply to this request; the payload is empty.
    pub fn error_reply(&self, error: ErrorInfo) -> Envelope {
        Envelope::new(format!("{}.response", self.message_type), self.codec, Vec::new())
            .with_correlation_id(self.correlation_key())
            .with_error(error)
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_expires_at(mut self, at: SystemTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// The id replies must carry: the correlation id if set, else the message id.
    pub fn correlation_key(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or(&self.id)
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
