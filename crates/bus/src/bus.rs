use async_trait::async_trait;

use crate::{EventEnvelope, EventId, Result};

/// Acknowledgment handle for a delivered message.
///
/// Opaque to consumers: it is handed back to [`EventBus::commit`] once the
/// handler has finished. Dropping it without committing leaves the message
/// pending, causing redelivery on the next poll.
#[derive(Debug, Clone)]
pub struct AckToken {
    pub(crate) partition: usize,
    pub(crate) offset: u64,
}

impl AckToken {
    /// The partition this delivery came from.
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// The offset of the delivered message within its partition.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// A single delivered message plus the handle to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub envelope: EventEnvelope,
    pub ack: AckToken,
}

/// Publish/subscribe substrate.
///
/// Delivery contract: at-least-once, ordered within a partition, with
/// independent cursors per consumer group. `poll` never advances a cursor;
/// only `commit` does, so an uncommitted message is delivered again.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a message; the routing key selects the partition.
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<EventId>;

    /// Returns up to `max` pending messages for the group, in partition
    /// order. Repeated polls without commits return the same messages.
    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<Delivery>>;

    /// Advances the group's cursor past the delivered message.
    ///
    /// Committing an already-committed offset is a no-op; redelivered
    /// batches may legitimately be committed twice.
    async fn commit(&self, topic: &str, group: &str, token: &AckToken) -> Result<()>;
}
