//! Event bus collaborator for the transit ticketing choreography.
//!
//! Topics are partitioned by routing key; each consumer group keeps its own
//! cursor per partition. Delivery is at-least-once: a message is redelivered
//! until its offset is committed, and a commit by one group never affects
//! another group's progress.

mod bus;
mod envelope;
mod error;
mod memory;

pub use bus::{AckToken, Delivery, EventBus};
pub use envelope::{EventEnvelope, EventId, topics};
pub use error::{BusError, Result};
pub use memory::InMemoryBus;
