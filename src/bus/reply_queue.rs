use crate::broker::{Broker, Topology};
use crate::error::BusError;
use crate::message::QueueNames;

/// A temporary reply queue, deleted when the guard drops.
///
/// Covers every exit of `Bus::send`: reply, error reply, transport error,
/// timeout and unwinding.
pub(crate) struct ReplyQueue<'a> {
    broker: &'a dyn Broker,
    name: String,
}

impl<'a> ReplyQueue<'a> {
    pub(crate) fn create(broker: &'a dyn Broker) -> Result<Self, BusError> {
        let name = QueueNames::temporary();
        broker.create_queue(&name)?;
        Ok(Self { broker, name })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ReplyQueue<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.broker.delete_queue(&self.name) {
            tracing::warn!(queue = %self.name, error = %err, "failed to delete reply queue");
        }
    }
}
