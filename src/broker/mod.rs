//! Broker port.
//!
//! The bus and the dispatcher talk to the transport only through these
//! traits. An adapter for a network broker implements all three; the crate
//! ships [`InMemoryBroker`] for single-process use and tests.
//!
//! ```text
//!   Bus::send ──publish──▶ mq:{Type}.inq ──consume──▶ worker
//!      ▲                                                │
//!      └────consume──── mq:tmp:{uuid} ◀────publish──────┘
//! ```

mod in_memory;

use std::time::Duration;

use crate::envelope::Envelope;
use crate::error::TransportError;

pub use in_memory::InMemoryBroker;

/// A message handed to a consumer, settled by exactly one `ack` or `reject`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub queue: String,
    pub envelope: Envelope,
}

pub trait Publisher: Send + Sync {
    /// Publish to a queue, or to every queue bound to an exchange.
    fn publish(&self, address: &str, envelope: Envelope) -> Result<(), TransportError>;
}

pub trait Consumer: Send + Sync {
    /// Take the next message from `queue`, blocking up to `timeout`.
    fn consume(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>, TransportError>;

    fn ack(&self, delivery: &Delivery) -> Result<(), TransportError>;

    /// Settle negatively; with `requeue` the message goes back to the head of its queue.
    fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<(), TransportError>;
}

pub trait Topology: Send + Sync {
    /// Idempotent.
    fn create_queue(&self, name: &str) -> Result<(), TransportError>;

    /// Idempotent. Also removes the queue's exchange bindings.
    fn delete_queue(&self, name: &str) -> Result<(), TransportError>;

    /// Idempotent.
    fn declare_exchange(&self, name: &str) -> Result<(), TransportError>;

    fn bind(&self, exchange: &str, queue: &str) -> Result<(), TransportError>;

    /// Reserve `queue` for one handler binding. `false` when another holds it.
    fn claim_queue(&self, queue: &str) -> Result<bool, TransportError>;

    /// Idempotent.
    fn release_queue(&self, queue: &str) -> Result<(), TransportError>;
}

/// Everything the bus needs from a transport.
pub trait Broker: Publisher + Consumer + Topology {}

impl<T: Publisher + Consumer + Topology> Broker for T {}
