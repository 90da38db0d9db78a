//! Request/reply bus.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 Bus (cloneable, per process)              │
//! │  send / send_with_timeout   blocking request/reply        │
//! │  send_one_way               point-to-point, no reply      │
//! │  publish / try_publish      fan-out to subscribers        │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │          Arc<dyn Broker>  (Publisher + Consumer +         │
//! │                            Topology)                      │
//! └───────────────────────────────────────────────────────────┘
//! ```

mod bus;
mod reply_queue;

pub use bus::Bus;
