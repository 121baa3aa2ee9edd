use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde_json::Value;

use crate::{Filter, Patch, Result};

/// Collection names used by the services.
pub mod collections {
    pub const TICKETS: &str = "tickets";
    pub const PAYMENTS: &str = "payments";
    pub const SEAT_INVENTORY: &str = "seat_inventory";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// A stream of matching documents.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Persistent document storage with exact-field-match queries.
///
/// Each service owns its collections; cross-service reads go through the
/// bus, never through another service's collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document into a collection.
    async fn insert(&self, collection: &str, doc: Value) -> Result<()>;

    /// Returns the first document matching the filter, if any.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>>;

    /// Streams every document matching the filter, in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<DocumentStream>;

    /// Applies a set-style patch to the first matching document.
    ///
    /// Returns true if a document was updated.
    async fn update_one(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<bool>;

    /// Counts documents matching the filter.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;
}

/// Convenience extensions shared by all stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Collects every matching document into a vector.
    async fn find_all(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        use futures_util::TryStreamExt;
        let stream = self.find(collection, filter).await?;
        stream.try_collect().await
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
