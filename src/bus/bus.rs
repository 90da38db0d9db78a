use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn, Span};

use super::reply_queue::ReplyQueue;
use crate::broker::{Broker, Consumer, Delivery, Publisher, Topology};
use crate::config::BusConfig;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::message::{Message, Request};

/// Longest single wait on the reply queue when `send` has no deadline.
const MAX_REPLY_WAIT: Duration = Duration::from_secs(60);

/// Synchronous request/reply and fire-and-forget publishing over a broker.
///
/// The bus is cheap to clone; clones share the broker. `send` blocks only the
/// calling thread, and every call gets its own reply queue, so any number of
/// threads can send concurrently without seeing each other's replies.
///
/// ## Example
///
/// ```ignore
/// let bus = Bus::new(InMemoryBroker::new());
/// let handle = Dispatcher::new(bus.clone())
///     .handle::<CreateAccount, _>(2, |req, _ctx| Ok(CreateAccountResponse { .. }))?
///     .start()?;
///
/// let response = bus.send(&CreateAccount { name: "Peter".into() })?;
/// bus.publish(&AccountCreatedEvent { id: response.account.id });
/// handle.stop();
/// ```
#[derive(Clone)]
pub struct Bus {
    broker: Arc<dyn Broker>,
    config: BusConfig,
    span: Span,
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").field("config", &self.config).finish()
    }
}

impl Bus {
    /// Bus over `broker` with default configuration.
    pub fn new<B: Broker + 'static>(broker: B) -> Self {
        Self::with_config(broker, BusConfig::default())
    }

    pub fn with_config<B: Broker + 'static>(broker: B, config: BusConfig) -> Self {
        Self::from_shared(Arc::new(broker), config)
    }

    pub fn from_shared(broker: Arc<dyn Broker>, config: BusConfig) -> Self {
        Self {
            broker,
            config,
            span: Span::none(),
        }
    }

    /// Attach the span every bus operation (and every dispatcher built on this bus) runs in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Fan a message out to the current subscribers of its type.
    ///
    /// Never fails visibly: errors are logged and the message is dropped.
    /// With no subscribers the message is dropped as well.
    pub fn publish<T: Message>(&self, message: &T) {
        if let Err(err) = self.try_publish(message) {
            let _enter = self.span.enter();
            warn!(message_type = T::TYPE, error = %err, "publish failed, message dropped");
        }
    }

    /// [`Bus::publish`], reporting failures.
    pub fn try_publish<T: Message>(&self, message: &T) -> Result<(), BusError> {
        let _enter = self.span.enter();
        let exchange = T::exchange();
        self.broker.declare_exchange(&exchange)?;

        let envelope = Envelope::encode(self.config.codec, message)?;
        debug!(message_type = T::TYPE, message_id = %envelope.id, %exchange, "publish");
        self.broker.publish(&exchange, envelope)?;
        Ok(())
    }

    /// Deliver a message to its type's inbound queue without waiting for a reply.
    pub fn send_one_way<T: Message>(&self, message: &T) -> Result<(), BusError> {
        let _enter = self.span.enter();
        let queue = T::inbound_queue();
        self.broker.create_queue(&queue)?;

        let envelope = Envelope::encode(self.config.codec, message)?;
        debug!(message_type = T::TYPE, message_id = %envelope.id, %queue, "send one-way");
        self.broker.publish(&queue, envelope)?;
        Ok(())
    }

    /// Send a request and block until its reply arrives or the configured timeout passes.
    pub fn send<R: Request>(&self, request: &R) -> Result<R::Response, BusError> {
        self.send_with_timeout(request, self.config.request_timeout())
    }

    /// [`Bus::send`] with an explicit timeout for this call.
    pub fn send_with_timeout<R: Request>(
        &self,
        request: &R,
        timeout: Duration,
    ) -> Result<R::Response, BusError> {
        let _enter = self.span.enter();
        // `None` when the timeout is too large to represent: wait without a deadline.
        let deadline = Instant::now().checked_add(timeout);

        let reply_queue = ReplyQueue::create(&*self.broker)?;
        let mut envelope =
            Envelope::encode(self.config.codec, request)?.with_reply_to(reply_queue.name());
        if let Some(expires_at) = SystemTime::now().checked_add(timeout) {
            envelope = envelope.with_expires_at(expires_at);
        }
        let correlation_id = envelope.id.clone();
        let envelope = envelope.with_correlation_id(correlation_id.clone());

        let inbound = R::inbound_queue();
        self.broker.create_queue(&inbound)?;
        debug!(
            message_type = R::TYPE,
            %correlation_id,
            queue = %inbound,
            reply_to = %reply_queue.name(),
            "send"
        );
        self.broker.publish(&inbound, envelope)?;

        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => MAX_REPLY_WAIT,
            };
            if remaining.is_zero() {
                warn!(message_type = R::TYPE, %correlation_id, ?timeout, "request timed out");
                return Err(BusError::RequestTimedOut {
                    message_type: R::TYPE.to_string(),
                    timeout,
                });
            }

            let Some(delivery) = self.broker.consume(reply_queue.name(), remaining)? else {
                continue;
            };
            if delivery.envelope.correlation_id.as_deref() != Some(correlation_id.as_str()) {
                debug!(
                    %correlation_id,
                    stray = ?delivery.envelope.correlation_id,
                    "discarding uncorrelated reply"
                );
                self.broker.reject(&delivery, false)?;
                continue;
            }

            self.broker.ack(&delivery)?;
            return Self::read_reply::<R>(delivery);
        }
    }

    fn read_reply<R: Request>(delivery: Delivery) -> Result<R::Response, BusError> {
        let envelope = delivery.envelope;
        if let Some(error) = envelope.error {
            debug!(message_type = R::TYPE, %error, "error reply");
            return Err(error.into_bus_error());
        }
        envelope.decode()
    }

    /// Publish a prepared envelope to a queue or exchange.
    pub(crate) fn publish_envelope(
        &self,
        address: &str,
        envelope: Envelope,
    ) -> Result<(), BusError> {
        self.broker.publish(address, envelope)?;
        Ok(())
    }
}
