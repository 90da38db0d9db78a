//! Message typing and queue naming.
//!
//! Every message type carries a stable name (`Message::TYPE`). Queue, exchange
//! and dead-letter names are derived from it, so independently started
//! producers and consumers agree on where a type lives:
//!
//! ```text
//! mq:{Type}.inq                 inbound (point-to-point) queue
//! mq:{Type}.dlq                 dead-letter queue
//! mx:{Type}                     fan-out exchange for publish
//! mq:{Type}.{subscriber}.subq   one subscriber's queue bound to the exchange
//! mq:tmp:{uuid}                 per-call reply queue
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A typed message that can travel over the bus.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Message)]
/// struct AccountCreatedEvent { id: u64 }
/// ```
pub trait Message: Serialize + DeserializeOwned + Send + 'static {
    /// Stable type name. Changing it moves the type to different queues.
    const TYPE: &'static str;

    fn inbound_queue() -> String {
        QueueNames::inbound(Self::TYPE)
    }

    fn dead_letter_queue() -> String {
        QueueNames::dead_letter(Self::TYPE)
    }

    fn exchange() -> String {
        QueueNames::exchange(Self::TYPE)
    }
}

/// A message that expects exactly one reply of type `Response`.
pub trait Request: Message {
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// Deterministic broker names for a message type.
pub struct QueueNames;

impl QueueNames {
    pub const PREFIX: &'static str = "mq:";
    pub const EXCHANGE_PREFIX: &'static str = "mx:";
    pub const TEMP_PREFIX: &'static str = "mq:tmp:";

    pub fn inbound(message_type: &str) -> String {
        format!("{}{message_type}.inq", Self::PREFIX)
    }

    pub fn dead_letter(message_type: &str) -> String {
        format!("{}{message_type}.dlq", Self::PREFIX)
    }

    pub fn exchange(message_type: &str) -> String {
        format!("{}{message_type}", Self::EXCHANGE_PREFIX)
    }

    pub fn subscription(message_type: &str, subscriber: &str) -> String {
        format!("{}{message_type}.{subscriber}.subq", Self::PREFIX)
    }

    /// A fresh, unique reply queue name.
    pub fn temporary() -> String {
        format!("{}{}", Self::TEMP_PREFIX, Uuid::new_v4())
    }

    pub fn is_temporary(queue: &str) -> bool {
        queue.starts_with(Self::TEMP_PREFIX)
    }
}
