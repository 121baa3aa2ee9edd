use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AckToken, BusError, Delivery, EventBus, EventEnvelope, EventId, Result,
};

const DEFAULT_PARTITIONS: usize = 4;

#[derive(Default)]
struct TopicState {
    /// Messages per partition, append-only.
    partitions: Vec<Vec<EventEnvelope>>,
}

#[derive(Default)]
struct BusInner {
    topics: HashMap<String, TopicState>,
    /// Committed cursor per (topic, group), one offset per partition.
    cursors: HashMap<(String, String), Vec<u64>>,
}

/// In-memory event bus implementation.
///
/// Backs the choreography in tests and single-process deployments with the
/// same contract a partitioned broker provides: per-partition ordering,
/// per-group cursors, at-least-once delivery with manual commit.
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<RwLock<BusInner>>,
    partition_count: usize,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    /// Creates a bus with the default partition count.
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Creates a bus with an explicit partition count per topic.
    pub fn with_partitions(partition_count: usize) -> Self {
        assert!(partition_count > 0, "partition count must be positive");
        Self {
            inner: Arc::new(RwLock::new(BusInner::default())),
            partition_count,
        }
    }

    /// Returns every message published to a topic, across all partitions,
    /// regardless of consumer-group progress. Test helper.
    pub async fn published(&self, topic: &str) -> Vec<EventEnvelope> {
        let inner = self.inner.read().await;
        let Some(state) = inner.topics.get(topic) else {
            return Vec::new();
        };
        let mut messages: Vec<_> = state.partitions.iter().flatten().cloned().collect();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }

    /// Returns the number of messages on a topic. Test helper.
    pub async fn topic_len(&self, topic: &str) -> usize {
        let inner = self.inner.read().await;
        inner
            .topics
            .get(topic)
            .map(|t| t.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.partition_count
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<EventId> {
        let envelope = EventEnvelope::new(topic, key, payload);
        let event_id = envelope.event_id;
        let partition = self.partition_for(key);

        let mut inner = self.inner.write().await;
        let state = inner.topics.entry(topic.to_string()).or_insert_with(|| {
            TopicState {
                partitions: vec![Vec::new(); self.partition_count],
            }
        });
        state.partitions[partition].push(envelope);

        metrics::counter!("bus_messages_published_total", "topic" => topic.to_string())
            .increment(1);
        tracing::debug!(%event_id, topic, key, partition, "message published");

        Ok(event_id)
    }

    async fn poll(&self, topic: &str, group: &str, max: usize) -> Result<Vec<Delivery>> {
        let partition_count = self.partition_count;
        let mut inner = self.inner.write().await;

        // Subscribing before the first publish is legal; the topic comes
        // into existence empty.
        inner.topics.entry(topic.to_string()).or_insert_with(|| TopicState {
            partitions: vec![Vec::new(); partition_count],
        });

        let cursors = inner
            .cursors
            .entry((topic.to_string(), group.to_string()))
            .or_insert_with(|| vec![0; partition_count])
            .clone();

        let Some(state) = inner.topics.get(topic) else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        for (partition, messages) in state.partitions.iter().enumerate() {
            let cursor = cursors[partition] as usize;
            for (i, envelope) in messages.iter().enumerate().skip(cursor) {
                if batch.len() >= max {
                    break;
                }
                batch.push(Delivery {
                    envelope: envelope.clone(),
                    ack: AckToken {
                        partition,
                        offset: i as u64,
                    },
                });
            }
        }
        Ok(batch)
    }

    async fn commit(&self, topic: &str, group: &str, token: &AckToken) -> Result<()> {
        let mut inner = self.inner.write().await;
        let cursors = inner
            .cursors
            .get_mut(&(topic.to_string(), group.to_string()))
            .ok_or_else(|| BusError::UnknownGroup {
                topic: topic.to_string(),
                group: group.to_string(),
            })?;

        let slot = cursors
            .get_mut(token.partition)
            .ok_or_else(|| BusError::UnknownPartition {
                topic: topic.to_string(),
                partition: token.partition,
            })?;

        // Double-committing a redelivered offset is a no-op.
        *slot = (*slot).max(token.offset + 1);
        metrics::counter!("bus_messages_committed_total", "topic" => topic.to_string())
            .increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics;

    #[tokio::test]
    async fn publish_then_poll_delivers_message() {
        let bus = InMemoryBus::new();
        bus.publish(topics::TICKET_PURCHASE, "trip-1", serde_json::json!({"n": 1}))
            .await
            .unwrap();

        let batch = bus.poll(topics::TICKET_PURCHASE, "inventory", 10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].envelope.key, "trip-1");
    }

    #[tokio::test]
    async fn uncommitted_messages_are_redelivered() {
        let bus = InMemoryBus::new();
        bus.publish(topics::PAYMENT_PROCESSED, "p-1", serde_json::json!(1))
            .await
            .unwrap();

        let first = bus.poll(topics::PAYMENT_PROCESSED, "notify", 10).await.unwrap();
        let second = bus.poll(topics::PAYMENT_PROCESSED, "notify", 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].envelope.event_id, second[0].envelope.event_id);
    }

    #[tokio::test]
    async fn commit_advances_the_cursor() {
        let bus = InMemoryBus::new();
        bus.publish(topics::PAYMENT_PROCESSED, "p-1", serde_json::json!(1))
            .await
            .unwrap();

        let batch = bus.poll(topics::PAYMENT_PROCESSED, "notify", 10).await.unwrap();
        bus.commit(topics::PAYMENT_PROCESSED, "notify", &batch[0].ack)
            .await
            .unwrap();

        let after = bus.poll(topics::PAYMENT_PROCESSED, "notify", 10).await.unwrap();
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn groups_have_independent_cursors() {
        let bus = InMemoryBus::new();
        bus.publish(topics::SCHEDULE_UPDATES, "trip-1", serde_json::json!(1))
            .await
            .unwrap();

        let batch = bus.poll(topics::SCHEDULE_UPDATES, "group-a", 10).await.unwrap();
        bus.commit(topics::SCHEDULE_UPDATES, "group-a", &batch[0].ack)
            .await
            .unwrap();

        // group-b has not committed anything and still sees the message.
        let other = bus.poll(topics::SCHEDULE_UPDATES, "group-b", 10).await.unwrap();
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn same_key_preserves_order() {
        let bus = InMemoryBus::new();
        for n in 0..5 {
            bus.publish(topics::TICKET_PURCHASE, "trip-9", serde_json::json!(n))
                .await
                .unwrap();
        }

        let batch = bus.poll(topics::TICKET_PURCHASE, "inventory", 10).await.unwrap();
        let values: Vec<i64> = batch
            .iter()
            .map(|d| d.envelope.payload.as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn poll_before_any_publish_is_empty() {
        let bus = InMemoryBus::new();
        let batch = bus.poll(topics::SERVICE_DISRUPTIONS, "notify", 10).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn partial_commit_redelivers_the_rest() {
        let bus = InMemoryBus::with_partitions(1);
        for n in 0..3 {
            bus.publish(topics::TICKET_PURCHASE, "trip-1", serde_json::json!(n))
                .await
                .unwrap();
        }

        let batch = bus.poll(topics::TICKET_PURCHASE, "inventory", 10).await.unwrap();
        assert_eq!(batch.len(), 3);
        bus.commit(topics::TICKET_PURCHASE, "inventory", &batch[0].ack)
            .await
            .unwrap();

        let rest = bus.poll(topics::TICKET_PURCHASE, "inventory", 10).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].envelope.payload.as_i64(), Some(1));
    }

    #[tokio::test]
    async fn commit_for_unknown_group_fails() {
        let bus = InMemoryBus::new();
        bus.publish(topics::SEAT_ALERTS, "trip-1", serde_json::json!(1))
            .await
            .unwrap();

        let token = AckToken {
            partition: 0,
            offset: 0,
        };
        let result = bus.commit(topics::SEAT_ALERTS, "nobody", &token).await;
        assert!(matches!(result, Err(BusError::UnknownGroup { .. })));
    }

    #[tokio::test]
    async fn max_limits_batch_size() {
        let bus = InMemoryBus::with_partitions(1);
        for n in 0..10 {
            bus.publish(topics::TICKET_VALIDATIONS, "p-1", serde_json::json!(n))
                .await
                .unwrap();
        }

        let batch = bus.poll(topics::TICKET_VALIDATIONS, "notify", 4).await.unwrap();
        assert_eq!(batch.len(), 4);
    }

    #[tokio::test]
    async fn published_helper_sees_all_messages() {
        let bus = InMemoryBus::new();
        bus.publish(topics::SEAT_ALERTS, "trip-1", serde_json::json!(1))
            .await
            .unwrap();
        bus.publish(topics::SEAT_ALERTS, "trip-2", serde_json::json!(2))
            .await
            .unwrap();

        assert_eq!(bus.topic_len(topics::SEAT_ALERTS).await, 2);
        assert_eq!(bus.published(topics::SEAT_ALERTS).await.len(), 2);
    }
}
