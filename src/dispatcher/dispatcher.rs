use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::context::Context;
use super::error::HandlerError;
use super::registry::{event_handler, request_handler, Binding, Registry};
use super::worker::{Worker, WorkerHandle, WorkerStats};
use crate::broker::Topology;
use crate::bus::Bus;
use crate::error::BusError;
use crate::message::{Message, QueueNames, Request};

/// Binds typed handlers to queues and runs them on worker threads.
///
/// Registration is a builder; `start` declares the queues and spawns
/// `workers` threads per binding. Bindings cannot change once started.
///
/// ## Example
///
/// ```ignore
/// let handle = Dispatcher::with_state(bus.clone(), AccountStore::default())
///     .handle::<CreateAccount, _>(4, create_account::handle)?
///     .on::<AccountCreatedEvent, _>(1, |event, _ctx| {
///         tracing::info!(id = event.id, "account created");
///         Ok(())
///     })?
///     .subscribe::<AccountDeletedEvent, _>("audit", 1, audit::handle)?
///     .start()?;
///
/// // ...
/// let stats = handle.stop();
/// ```
pub struct Dispatcher<S = ()> {
    bus: Bus,
    state: Arc<S>,
    registry: Registry<S>,
}

impl Dispatcher<()> {
    /// A dispatcher whose handlers need no shared state.
    pub fn new(bus: Bus) -> Self {
        Self::with_state(bus, ())
    }
}

impl<S: Send + Sync + 'static> Dispatcher<S> {
    pub fn with_state(bus: Bus, state: S) -> Self {
        Self::with_shared_state(bus, Arc::new(state))
    }

    /// Share state the caller keeps a handle to as well.
    pub fn with_shared_state(bus: Bus, state: Arc<S>) -> Self {
        Self {
            bus,
            state,
            registry: Registry::default(),
        }
    }

    /// Handle requests of type `R` from `mq:{R}.inq`, replying to senders.
    pub fn handle<R, F>(mut self, workers: usize, handler: F) -> Result<Self, BusError>
    where
        R: Request,
        F: Fn(R, &Context<S>) -> Result<R::Response, HandlerError> + Send + Sync + 'static,
    {
        self.registry.insert(Binding {
            message_type: R::TYPE,
            queue: R::inbound_queue(),
            dead_letter: R::dead_letter_queue(),
            exchange: None,
            workers,
            handler: request_handler(handler),
        })?;
        Ok(self)
    }

    /// Handle one-way messages of type `M` from `mq:{M}.inq`.
    pub fn on<M, F>(mut self, workers: usize, handler: F) -> Result<Self, BusError>
    where
        M: Message,
        F: Fn(M, &Context<S>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry.insert(Binding {
            message_type: M::TYPE,
            queue: M::inbound_queue(),
            dead_letter: M::dead_letter_queue(),
            exchange: None,
            workers,
            handler: event_handler(handler),
        })?;
        Ok(self)
    }

    /// Receive every published `M` on this subscriber's own queue.
    ///
    /// Each distinct `subscriber` gets a copy of every message; workers of
    /// one subscriber compete for those copies.
    pub fn subscribe<M, F>(
        mut self,
        subscriber: &str,
        workers: usize,
        handler: F,
    ) -> Result<Self, BusError>
    where
        M: Message,
        F: Fn(M, &Context<S>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry.insert(Binding {
            message_type: M::TYPE,
            queue: QueueNames::subscription(M::TYPE, subscriber),
            dead_letter: M::dead_letter_queue(),
            exchange: Some(M::exchange()),
            workers,
            handler: event_handler(handler),
        })?;
        Ok(self)
    }

    /// Registered message types, in registration order (repeats for several subscriptions).
    pub fn message_types(&self) -> Vec<&'static str> {
        self.registry.iter().map(|b| b.message_type).collect()
    }

    pub fn queues(&self) -> Vec<&str> {
        self.registry.iter().map(|b| b.queue.as_str()).collect()
    }

    /// Declare every queue and binding, then spawn the workers.
    ///
    /// Fails with `DuplicateHandler` when another running dispatcher on the
    /// same broker already consumes one of the queues.
    pub fn start(self) -> Result<DispatcherHandle, BusError> {
        let _enter = self.bus.span().enter();
        let broker = self.bus.broker();
        // Releases whatever was claimed if start bails out early.
        let mut handle = DispatcherHandle {
            bus: self.bus.clone(),
            workers: Vec::new(),
            claimed: Vec::new(),
        };

        for binding in self.registry.iter() {
            if !broker.claim_queue(&binding.queue)? {
                return Err(BusError::DuplicateHandler(binding.queue.clone()));
            }
            handle.claimed.push(binding.queue.clone());
        }

        for binding in self.registry.iter() {
            broker.create_queue(&binding.queue)?;
            broker.create_queue(&binding.dead_letter)?;
            if let Some(exchange) = &binding.exchange {
                broker.declare_exchange(exchange)?;
                broker.bind(exchange, &binding.queue)?;
            }
        }

        let bindings = self.registry.into_bindings();
        let binding_count = bindings.len();
        for binding in bindings {
            let binding = Arc::new(binding);
            for index in 0..binding.workers {
                let worker = Worker::new(
                    index,
                    self.bus.clone(),
                    Arc::clone(&binding),
                    Arc::clone(&self.state),
                );
                match worker.spawn() {
                    Ok(worker) => handle.workers.push(worker),
                    Err(err) => {
                        for worker in handle.workers.drain(..) {
                            worker.join();
                        }
                        return Err(err);
                    }
                }
            }
        }

        info!(
            bindings = binding_count,
            workers = handle.workers.len(),
            "dispatcher started"
        );
        Ok(handle)
    }
}

/// Running dispatcher. Dropping it signals every worker to stop without waiting
/// and gives its queues back for another dispatcher to claim.
pub struct DispatcherHandle {
    bus: Bus,
    workers: Vec<WorkerHandle>,
    claimed: Vec<String>,
}

impl DispatcherHandle {
    /// Stop all workers, wait for in-flight messages, and collect their stats.
    ///
    /// Queues stay declared; messages still queued are kept for the next start.
    pub fn stop(mut self) -> DispatcherStats {
        self.signal_stop();

        let mut stats = DispatcherStats::default();
        for worker in std::mem::take(&mut self.workers) {
            let queue = worker.queue().to_string();
            let worker_stats = worker.join();
            stats.per_queue.entry(queue).or_default().merge(&worker_stats);
        }

        let _enter = self.bus.span().enter();
        info!(total = ?stats.total(), "dispatcher stopped");
        stats
    }

    pub fn signal_stop(&self) {
        for worker in &self.workers {
            worker.signal_stop();
        }
    }

    /// Queues being consumed, sorted and deduplicated.
    pub fn queues(&self) -> Vec<&str> {
        let mut queues: Vec<&str> = self.workers.iter().map(WorkerHandle::queue).collect();
        queues.sort_unstable();
        queues.dedup();
        queues
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.signal_stop();
        let broker = self.bus.broker();
        for queue in self.claimed.drain(..) {
            if let Err(err) = broker.release_queue(&queue) {
                warn!(%queue, error = %err, "queue claim not released");
            }
        }
    }
}

/// Stats of a stopped dispatcher, per consumed queue.
#[derive(Debug, Default, Clone)]
pub struct DispatcherStats {
    per_queue: BTreeMap<String, WorkerStats>,
}

impl DispatcherStats {
    /// Summed stats of the workers on `queue`; zeroes for unknown queues.
    pub fn queue(&self, queue: &str) -> WorkerStats {
        self.per_queue.get(queue).copied().unwrap_or_default()
    }

    pub fn total(&self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for stats in self.per_queue.values() {
            total.merge(stats);
        }
        total
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkerStats)> {
        self.per_queue.iter().map(|(q, s)| (q.as_str(), s))
    }
}
