//! Document-store collaborator for the transit ticketing services.
//!
//! The services depend only on exact-field-match filters and set-style
//! partial updates, never on a specific query language. Two backends:
//! [`InMemoryDocumentStore`] for tests and single-process deployments,
//! [`PostgresDocumentStore`] (JSONB) for durable storage.

mod error;
mod filter;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use filter::{Filter, Patch};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt, DocumentStream, collections};
