//! Synchronous request/reply over a queue-based message broker.
//!
//! - [`Bus`] sends a typed request and blocks until the correlated reply
//!   arrives (or the timeout passes), publishes fan-out events, and sends
//!   one-way messages.
//! - [`dispatcher::Dispatcher`] binds typed handlers to queues and runs them
//!   on worker pools with acknowledge, retry and dead-letter semantics.
//! - [`broker`] is the transport port, with an in-memory adapter.
//!
//! ```ignore
//! use mqbus::broker::InMemoryBroker;
//! use mqbus::dispatcher::Dispatcher;
//! use mqbus::{Bus, Message};
//!
//! #[derive(Serialize, Deserialize, Message)]
//! #[message(response = Greeting)]
//! struct Hello { name: String }
//!
//! let bus = Bus::new(InMemoryBroker::new());
//! let handle = Dispatcher::new(bus.clone())
//!     .handle::<Hello, _>(2, |req, _ctx| Ok(Greeting(format!("hello {}", req.name))))?
//!     .start()?;
//!
//! let greeting = bus.send(&Hello { name: "Peter".into() })?;
//! handle.stop();
//! ```

pub mod broker;
mod bus;
mod codec;
mod config;
pub mod dispatcher;
mod envelope;
mod error;
mod message;

pub use bus::Bus;
pub use codec::Codec;
pub use config::BusConfig;
pub use envelope::{Envelope, ErrorInfo, ErrorKind};
pub use error::{BusError, TransportError};
pub use message::{Message, QueueNames, Request};

// Derive macro; shares its name with the trait like serde's derives do.
pub use mqbus_macros::Message;
