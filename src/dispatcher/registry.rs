//! Type-erased handler bindings, keyed by queue.

use std::sync::Arc;

use super::context::Context;
use super::error::HandlerError;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::message::{Message, Request};

/// What a handler did with one message.
pub(crate) enum Outcome {
    /// Handled; send this envelope to the request's `reply_to`.
    Reply(Envelope),
    /// Handled; nothing to send.
    Done,
    Failed(HandlerError),
}

pub(crate) type ErasedHandler<S> = Arc<dyn Fn(&Context<S>) -> Outcome + Send + Sync>;

/// One queue and the handler its workers run.
pub(crate) struct Binding<S> {
    pub message_type: &'static str,
    pub queue: String,
    pub dead_letter: String,
    /// Set for subscriptions: the exchange `queue` is bound to.
    pub exchange: Option<String>,
    pub workers: usize,
    pub handler: ErasedHandler<S>,
}

pub(crate) struct Registry<S> {
    bindings: Vec<Binding<S>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<S> Registry<S> {
    pub fn insert(&mut self, binding: Binding<S>) -> Result<(), BusError> {
        if binding.workers == 0 {
            return Err(BusError::InvalidWorkerCount(binding.queue));
        }
        if self.bindings.iter().any(|b| b.queue == binding.queue) {
            return Err(BusError::DuplicateHandler(binding.queue));
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding<S>> {
        self.bindings.iter()
    }

    pub fn into_bindings(self) -> Vec<Binding<S>> {
        self.bindings
    }
}

fn erase<S, F>(f: F) -> ErasedHandler<S>
where
    F: Fn(&Context<S>) -> Outcome + Send + Sync + 'static,
{
    Arc::new(f)
}

fn decode<M: Message, S>(ctx: &Context<S>) -> Result<M, HandlerError> {
    ctx.envelope()
        .decode()
        .map_err(|e| HandlerError::DecodeFailed(e.to_string()))
}

/// Wrap a request handler: decode, run, encode the reply if anyone waits for it.
pub(crate) fn request_handler<R, S, F>(handler: F) -> ErasedHandler<S>
where
    R: Request,
    S: 'static,
    F: Fn(R, &Context<S>) -> Result<R::Response, HandlerError> + Send + Sync + 'static,
{
    erase(move |ctx: &Context<S>| {
        let request = match decode::<R, S>(ctx) {
            Ok(request) => request,
            Err(err) => return Outcome::Failed(err),
        };
        let response = match handler(request, ctx) {
            Ok(response) => response,
            Err(err) => return Outcome::Failed(err),
        };
        if ctx.envelope().reply_to.is_none() {
            return Outcome::Done;
        }
        match ctx.envelope().reply(&response) {
            Ok(reply) => Outcome::Reply(reply),
            Err(err) => Outcome::Failed(HandlerError::EncodeFailed(err.to_string())),
        }
    })
}

/// Wrap a handler that produces no reply.
pub(crate) fn event_handler<M, S, F>(handler: F) -> ErasedHandler<S>
where
    M: Message,
    S: 'static,
    F: Fn(M, &Context<S>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    erase(move |ctx: &Context<S>| {
        match decode::<M, S>(ctx).and_then(|message| handler(message, ctx)) {
            Ok(()) => Outcome::Done,
            Err(err) => Outcome::Failed(err),
        }
    })
}
