//! Worker threads: consume, run the handler, settle the delivery.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use tracing::{debug, error, info_span, warn, Span};

use super::context::Context;
use super::error::HandlerError;
use super::registry::{Binding, Outcome};
use crate::broker::{Consumer, Delivery};
use crate::bus::Bus;
use crate::error::BusError;

/// Counters reported by a worker when it stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Messages whose handler succeeded.
    pub handled: usize,
    /// Replies delivered to a `reply_to` queue.
    pub replied: usize,
    /// Failed messages republished for another attempt.
    pub retried: usize,
    pub dead_lettered: usize,
    /// Requests dropped because their sender had already timed out.
    pub expired: usize,
    /// Handler failures, including the ones later retried.
    pub failed: usize,
    pub polls: usize,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.handled += other.handled;
        self.replied += other.replied;
        self.retried += other.retried;
        self.dead_lettered += other.dead_lettered;
        self.expired += other.expired;
        self.failed += other.failed;
        self.polls += other.polls;
    }
}

pub(crate) struct Worker<S> {
    id: String,
    bus: Bus,
    binding: Arc<Binding<S>>,
    state: Arc<S>,
    max_retries: u32,
    span: Span,
}

impl<S: Send + Sync + 'static> Worker<S> {
    pub fn new(index: usize, bus: Bus, binding: Arc<Binding<S>>, state: Arc<S>) -> Self {
        let id = format!("{}#{index}", binding.queue);
        let span = info_span!(parent: bus.span(), "worker", worker = %id);
        Self {
            max_retries: bus.config().max_retries,
            id,
            bus,
            binding,
            state,
            span,
        }
    }

    pub fn spawn(self) -> Result<WorkerHandle, BusError> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let queue = self.binding.queue.clone();
        let handle = thread::Builder::new()
            .name(self.id.clone())
            .spawn(move || self.run(stop_rx))?;

        Ok(WorkerHandle {
            queue,
            stop_tx,
            handle: Some(handle),
        })
    }

    fn run(self, stop_rx: Receiver<()>) -> WorkerStats {
        let _enter = self.span.enter();
        let poll_interval = self.bus.config().poll_interval();
        let mut stats = WorkerStats::default();
        debug!(queue = %self.binding.queue, "worker started");

        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            stats.polls += 1;

            match self.bus.broker().consume(&self.binding.queue, poll_interval) {
                Ok(Some(delivery)) => self.process(delivery, &mut stats),
                Ok(None) => {}
                Err(err) => {
                    warn!(queue = %self.binding.queue, error = %err, "consume failed");
                    thread::sleep(poll_interval);
                }
            }
        }

        debug!(?stats, "worker stopped");
        stats
    }

    fn process(&self, delivery: Delivery, stats: &mut WorkerStats) {
        let envelope = &delivery.envelope;
        debug!(
            message_type = self.binding.message_type,
            message_id = %envelope.id,
            attempt = envelope.retry_attempts,
            "received"
        );

        if envelope.is_expired_at(SystemTime::now()) {
            debug!(message_id = %envelope.id, "sender gave up, dropping expired request");
            stats.expired += 1;
            self.ack(&delivery);
            return;
        }

        let ctx = Context::new(
            self.bus.clone(),
            envelope.clone(),
            self.id.clone(),
            Arc::clone(&self.state),
        );
        let handler = &self.binding.handler;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler(&ctx))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(message_id = %envelope.id, panic_msg = %msg, "handler panicked");
                Outcome::Failed(HandlerError::Panicked(msg))
            }
        };

        match outcome {
            Outcome::Reply(reply) => {
                stats.handled += 1;
                if let Some(reply_to) = &envelope.reply_to {
                    // The reply queue is gone once the sender times out.
                    match self.bus.publish_envelope(reply_to, reply) {
                        Ok(()) => stats.replied += 1,
                        Err(err) => {
                            warn!(%reply_to, error = %err, "reply not delivered")
                        }
                    }
                }
                self.ack(&delivery);
            }
            Outcome::Done => {
                stats.handled += 1;
                self.ack(&delivery);
            }
            Outcome::Failed(err) => self.fail(&delivery, err, stats),
        }
    }

    fn fail(&self, delivery: &Delivery, err: HandlerError, stats: &mut WorkerStats) {
        stats.failed += 1;
        let envelope = &delivery.envelope;
        let info = err.error_info();

        if err.is_retryable() && envelope.retry_attempts < self.max_retries {
            let mut retry = envelope.clone().with_error(info);
            retry.retry_attempts += 1;
            warn!(
                message_id = %envelope.id,
                attempt = retry.retry_attempts,
                max_retries = self.max_retries,
                error = %err,
                "handler failed, retrying"
            );
            match self.bus.publish_envelope(&self.binding.queue, retry) {
                Ok(()) => {
                    stats.retried += 1;
                    self.ack(delivery);
                }
                Err(publish_err) => self.requeue(delivery, &publish_err),
            }
            return;
        }

        let dead = envelope.clone().with_error(info.clone());
        match self.bus.publish_envelope(&self.binding.dead_letter, dead) {
            Ok(()) => {
                stats.dead_lettered += 1;
                error!(
                    message_id = %envelope.id,
                    dead_letter = %self.binding.dead_letter,
                    attempts = envelope.retry_attempts + 1,
                    error = %err,
                    "message dead-lettered"
                );
                if let Some(reply_to) = &envelope.reply_to {
                    if let Err(reply_err) = self
                        .bus
                        .publish_envelope(reply_to, envelope.error_reply(info))
                    {
                        debug!(%reply_to, error = %reply_err, "error reply not delivered");
                    }
                }
                self.ack(delivery);
            }
            Err(publish_err) => self.requeue(delivery, &publish_err),
        }
    }

    fn ack(&self, delivery: &Delivery) {
        if let Err(err) = self.bus.broker().ack(delivery) {
            warn!(tag = delivery.tag, error = %err, "ack failed");
        }
    }

    /// Hand the message back to the broker after a failed republish.
    fn requeue(&self, delivery: &Delivery, cause: &BusError) {
        error!(message_id = %delivery.envelope.id, error = %cause, "republish failed, requeueing");
        if let Err(err) = self.bus.broker().reject(delivery, true) {
            warn!(tag = delivery.tag, error = %err, "requeue failed");
        }
        thread::sleep(self.bus.config().poll_interval());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to one worker thread. Dropping it signals the worker to stop.
pub(crate) struct WorkerHandle {
    queue: String,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl WorkerHandle {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Stop the worker and wait for its in-flight message to finish.
    pub fn join(mut self) -> WorkerStats {
        self.signal_stop();
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => WorkerStats::default(),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
