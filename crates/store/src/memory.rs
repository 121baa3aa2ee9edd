use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    DocumentStore, DocumentStream, Filter, Patch, Result, StoreError,
};

/// In-memory document store implementation.
///
/// Stores documents per collection in insertion order and provides the same
/// interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection. Test helper.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Returns true if a collection holds no documents.
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Clears all collections.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, doc: Value) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<DocumentStream> {
        use futures_util::stream;

        let collections = self.collections.read().await;
        let matching: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::pin(stream::iter(matching.into_iter().map(Ok))))
    }

    async fn update_one(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };

        for doc in docs.iter_mut() {
            if filter.matches(doc) {
                patch
                    .apply(doc)
                    .map_err(|()| StoreError::NotAnObject(collection.to_string()))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }
}
