use thiserror::Error;

/// Errors that can occur when interacting with the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// A commit referenced a partition the topic does not have.
    #[error("Unknown partition {partition} for topic '{topic}'")]
    UnknownPartition { topic: String, partition: usize },

    /// A commit was issued for a group that never polled the topic.
    #[error("Unknown consumer group '{group}' for topic '{topic}'")]
    UnknownGroup { topic: String, group: String },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bus substrate is unavailable.
    #[error("Bus unavailable: {0}")]
    Unavailable(String),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
