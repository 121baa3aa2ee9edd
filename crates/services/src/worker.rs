//! Polling consumer loop with commit-after-success semantics.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use bus::{EventBus, EventEnvelope};

use crate::Result;

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Maximum deliveries taken per poll.
const BATCH_SIZE: usize = 32;

/// One unit of consumption logic attached to a topic subscription.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    /// Handles one delivered envelope. An `Err` leaves the delivery
    /// uncommitted so the bus redelivers it.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// Handle to a running worker task.
pub struct WorkerHandle {
    topic: String,
    group: String,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// The topic the worker consumes.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The worker's consumer group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Waits for the worker task to finish after shutdown is signalled.
    pub async fn join(self) {
        if let Err(error) = self.join.await {
            tracing::error!(topic = %self.topic, %error, "worker task panicked");
        }
    }
}

/// Long-lived polling loop bound to one (topic, consumer group) pair.
///
/// Each poll's batch is handled strictly sequentially; a delivery is
/// committed only after its handler returns Ok. A failure halts the
/// failing partition for the rest of the batch so redelivery preserves
/// per-partition order, while deliveries from other partitions keep
/// flowing. Shutdown lets an in-flight batch finish before the task
/// exits.
pub struct ConsumerWorker<B> {
    bus: Arc<B>,
    topic: String,
    group: String,
    poll_interval: Duration,
}

impl<B> ConsumerWorker<B>
where
    B: EventBus + 'static,
{
    /// Creates a worker with the default poll interval.
    pub fn new(bus: Arc<B>, topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            group: group.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Spawns the polling task.
    pub fn spawn(
        self,
        handler: Arc<dyn ConsumerHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerHandle {
        let topic = self.topic.clone();
        let group = self.group.clone();
        let join = tokio::spawn(async move {
            tracing::info!(topic = %self.topic, group = %self.group, "consumer worker started");
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        self.drain_batch(handler.as_ref()).await;
                    }
                }
            }
            // One final drain so messages published just before shutdown
            // are not stranded until restart.
            self.drain_batch(handler.as_ref()).await;
            tracing::info!(topic = %self.topic, group = %self.group, "consumer worker stopped");
        });
        WorkerHandle { topic, group, join }
    }

    async fn drain_batch(&self, handler: &dyn ConsumerHandler) {
        let deliveries = match self.bus.poll(&self.topic, &self.group, BATCH_SIZE).await {
            Ok(deliveries) => deliveries,
            Err(error) => {
                tracing::warn!(topic = %self.topic, %error, "poll failed");
                return;
            }
        };

        // Ordering only matters within a partition, so a failure halts
        // that partition for the rest of the batch and the others keep
        // flowing.
        let mut halted: HashSet<usize> = HashSet::new();
        for delivery in deliveries {
            let partition = delivery.ack.partition();
            if halted.contains(&partition) {
                continue;
            }
            match handler.handle(&delivery.envelope).await {
                Ok(()) => {
                    if let Err(error) = self
                        .bus
                        .commit(&self.topic, &self.group, &delivery.ack)
                        .await
                    {
                        tracing::warn!(topic = %self.topic, partition, %error, "commit failed");
                        halted.insert(partition);
                        continue;
                    }
                    metrics::counter!("worker_events_handled_total", "topic" => self.topic.clone())
                        .increment(1);
                }
                Err(error) => {
                    tracing::warn!(
                        topic = %self.topic,
                        partition,
                        event_id = %delivery.envelope.event_id,
                        transient = error.is_transient(),
                        %error,
                        "handler failed; delivery left uncommitted"
                    );
                    metrics::counter!("worker_events_failed_total", "topic" => self.topic.clone())
                        .increment(1);
                    halted.insert(partition);
                }
            }
        }
    }
}
