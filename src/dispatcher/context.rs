//! Context passed to message handlers.

use std::sync::Arc;

use crate::bus::Bus;
use crate::envelope::Envelope;

/// Everything a handler can see besides its decoded message.
///
/// Generic over `S`, the state shared by all handlers of a dispatcher
/// (a store, a client pool, ...).
///
/// ## Example
///
/// ```ignore
/// fn handle(req: CreateAccount, ctx: &Context<AccountStore>) -> Result<CreateAccountResponse, HandlerError> {
///     let account = ctx.state().insert(&req.name);
///     ctx.bus().publish(&AccountCreatedEvent { id: account.id });
///     Ok(CreateAccountResponse { account })
/// }
/// ```
pub struct Context<S = ()> {
    bus: Bus,
    envelope: Envelope,
    worker: String,
    state: Arc<S>,
}

impl<S> Context<S> {
    pub(crate) fn new(bus: Bus, envelope: Envelope, worker: String, state: Arc<S>) -> Self {
        Self {
            bus,
            envelope,
            worker,
            state,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// The bus, for publishing events or sending further requests.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn message_id(&self) -> &str {
        &self.envelope.id
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.envelope.correlation_id.as_deref()
    }

    /// 0 on first handling, incremented per retry.
    pub fn retry_attempts(&self) -> u32 {
        self.envelope.retry_attempts
    }

    pub fn delivery_count(&self) -> u32 {
        self.envelope.delivery_count
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.envelope.header(key)
    }

    /// Name of the worker thread running the handler, `{queue}#{n}`.
    pub fn worker_id(&self) -> &str {
        &self.worker
    }
}
