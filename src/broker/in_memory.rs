//! In-process broker for single-process deployments and tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{Consumer, Delivery, Publisher, Topology};
use crate::envelope::Envelope;
use crate::error::TransportError;

/// Longest single Condvar wait; longer timeouts re-check and wait again.
const MAX_WAIT: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Queue {
    messages: VecDeque<Envelope>,
    /// Signalled when this queue gains a message or is deleted.
    ready: Arc<Condvar>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, Queue>,
    /// exchange -> bound queues
    exchanges: HashMap<String, BTreeSet<String>>,
    /// tag -> (queue, delivered envelope)
    unacked: HashMap<u64, (String, Envelope)>,
    /// queues reserved by a running handler binding
    claimed: BTreeSet<String>,
    next_tag: u64,
}

impl State {
    fn take_next(&mut self, queue: &str) -> Option<Delivery> {
        let mut envelope = self.queues.get_mut(queue)?.messages.pop_front()?;
        envelope.delivery_count += 1;

        self.next_tag += 1;
        let tag = self.next_tag;
        self.unacked
            .insert(tag, (queue.to_string(), envelope.clone()));

        Some(Delivery {
            tag,
            queue: queue.to_string(),
            envelope,
        })
    }
}


/// Thread-safe in-memory broker.
///
/// - FIFO per queue, many competing consumers per queue
/// - at-least-once: a delivery stays outstanding until acked or rejected
/// - fan-out exchanges copy each message into every bound queue
/// - blocking `consume` waits on its queue's `Condvar`, it never spins
///
/// Clones share the same state.
///
/// ```
/// use std::time::Duration;
/// use mqbus::broker::{Consumer, InMemoryBroker, Publisher, Topology};
/// use mqbus::{Codec, Envelope};
///
/// let broker = InMemoryBroker::new();
/// broker.create_queue("mq:Ping.inq").unwrap();
/// broker.publish("mq:Ping.inq", Envelope::new("Ping", Codec::Json, b"{}".to_vec())).unwrap();
///
/// let delivery = broker.consume("mq:Ping.inq", Duration::from_millis(10)).unwrap().unwrap();
/// assert_eq!(delivery.envelope.message_type, "Ping");
/// broker.ack(&delivery).unwrap();
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self, op: &'static str) -> Result<MutexGuard<'_, State>, TransportError> {
        self.state
            .lock()
            .map_err(|_| TransportError::Poisoned(op))
    }

    /// Inspection helpers below tolerate poisoning; they are for tests and diagnostics.
    fn inspect(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// All queue names, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inspect().queues.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.inspect().queues.contains_key(name)
    }

    /// Ready (not yet delivered) messages in a queue; 0 for unknown queues.
    pub fn len(&self, queue: &str) -> usize {
        self.inspect().queues.get(queue).map_or(0, |q| q.messages.len())
    }

    /// Deliveries handed out but not yet settled, across all queues.
    pub fn unacked_len(&self) -> usize {
        self.inspect().unacked.len()
    }

    /// Snapshot of the ready messages in a queue, head first.
    pub fn messages(&self, queue: &str) -> Vec<Envelope> {
        self.inspect()
            .queues
            .get(queue)
            .map(|q| q.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Queues bound to an exchange, sorted.
    pub fn bindings(&self, exchange: &str) -> Vec<String> {
        self.inspect()
            .exchanges
            .get(exchange)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all ready messages in a queue, returning how many were removed.
    pub fn purge(&self, queue: &str) -> usize {
        self.inspect()
            .queues
            .get_mut(queue)
            .map_or(0, |q| q.messages.drain(..).count())
    }
}

impl Publisher for InMemoryBroker {
    fn publish(&self, address: &str, envelope: Envelope) -> Result<(), TransportError> {
        let mut state = self.lock("publish")?;
        let mut woken = Vec::new();

        if let Some(queue) = state.queues.get_mut(address) {
            queue.messages.push_back(envelope);
            woken.push(Arc::clone(&queue.ready));
        } else if let Some(bound) = state.exchanges.get(address) {
            if bound.is_empty() {
                tracing::trace!(exchange = address, "no bindings, message dropped");
                return Ok(());
            }
            let bound: Vec<String> = bound.iter().cloned().collect();
            for queue in bound {
                if let Some(q) = state.queues.get_mut(&queue) {
                    q.messages.push_back(envelope.clone());
                    woken.push(Arc::clone(&q.ready));
                }
            }
        } else {
            return Err(TransportError::UnknownAddress(address.to_string()));
        }

        drop(state);
        for ready in woken {
            ready.notify_all();
        }
        Ok(())
    }
}

impl Consumer for InMemoryBroker {
    fn consume(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>, TransportError> {
        // `None` for timeouts past the clock's range: wait until a message arrives.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock("consume")?;

        loop {
            let ready = match state.queues.get(queue) {
                Some(q) => Arc::clone(&q.ready),
                None => return Err(TransportError::QueueNotFound(queue.to_string())),
            };
            if let Some(delivery) = state.take_next(queue) {
                return Ok(Some(delivery));
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => MAX_WAIT,
            };
            if remaining.is_zero() {
                return Ok(None);
            }
            let (guard, _) = ready
                .wait_timeout(state, remaining.min(MAX_WAIT))
                .map_err(|_| TransportError::Poisoned("consume"))?;
            state = guard;
        }
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), TransportError> {
        let mut state = self.lock("ack")?;
        state
            .unacked
            .remove(&delivery.tag)
            .map(|_| ())
            .ok_or(TransportError::UnknownDelivery(delivery.tag))
    }

    fn reject(&self, delivery: &Delivery, requeue: bool) -> Result<(), TransportError> {
        let mut state = self.lock("reject")?;
        let (queue, envelope) = state
            .unacked
            .remove(&delivery.tag)
            .ok_or(TransportError::UnknownDelivery(delivery.tag))?;

        if !requeue {
            return Ok(());
        }
        // A requeue onto a deleted queue drops the message.
        if let Some(q) = state.queues.get_mut(&queue) {
            q.messages.push_front(envelope);
            let ready = Arc::clone(&q.ready);
            drop(state);
            ready.notify_all();
        }
        Ok(())
    }
}

impl Topology for InMemoryBroker {
    fn create_queue(&self, name: &str) -> Result<(), TransportError> {
        self.lock("create_queue")?
            .queues
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn delete_queue(&self, name: &str) -> Result<(), TransportError> {
        let mut state = self.lock("delete_queue")?;
        let removed = state.queues.remove(name);
        for bound in state.exchanges.values_mut() {
            bound.remove(name);
        }
        drop(state);
        // Consumers blocked on the deleted queue see QueueNotFound.
        if let Some(queue) = removed {
            queue.ready.notify_all();
        }
        Ok(())
    }

    fn declare_exchange(&self, name: &str) -> Result<(), TransportError> {
        self.lock("declare_exchange")?
            .exchanges
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    fn bind(&self, exchange: &str, queue: &str) -> Result<(), TransportError> {
        let mut state = self.lock("bind")?;
        if !state.queues.contains_key(queue) {
            return Err(TransportError::QueueNotFound(queue.to_string()));
        }
        let bound = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| TransportError::ExchangeNotFound(exchange.to_string()))?;
        bound.insert(queue.to_string());
        Ok(())
    }

    fn claim_queue(&self, queue: &str) -> Result<bool, TransportError> {
        Ok(self.lock("claim_queue")?.claimed.insert(queue.to_string()))
    }

    fn release_queue(&self, queue: &str) -> Result<(), TransportError> {
        self.lock("release_queue")?.claimed.remove(queue);
        Ok(())
    }
}
