//! Boundary to the remote document store.
//!
//! The storefront never talks to a concrete database: checkout reads and
//! writes through these four collection-shaped traits, and the host
//! application injects whatever client it runs against. [`memory`] ships an
//! in-process implementation used by tests and demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::models::{InventoryLevel, Order, OrderPaymentUpdate, Payment, Product};

pub mod memory;

pub use memory::InMemoryStore;

/// Remote document-store failure, as seen at a collection boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Document {id} in {collection} is malformed: {source}")]
    Malformed {
        collection: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document {id} not found in {collection}")]
    MissingDocument {
        collection: &'static str,
        id: String,
    },

    #[error("Write to {collection} rejected: {reason}")]
    WriteRejected {
        collection: &'static str,
        reason: String,
    },
}

/// Read-only access to the product catalog.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Fetches the given products in one batched call. Ids that do not
    /// resolve are simply absent from the result; order is not significant.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError>;
}

/// Orders collection: created once per checkout, then updated in place
/// when the payment settles.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Creates the order document under its client-generated id.
    async fn create(&self, order: &Order) -> Result<(), StoreError>;

    /// Read-back used by the idempotent retry contract.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Applies the payment field set to an existing order document.
    async fn apply_payment(&self, id: Uuid, update: &OrderPaymentUpdate) -> Result<(), StoreError>;
}

/// Payments collection: append-only from this crate's point of view.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: &Payment) -> Result<(), StoreError>;

    /// Read-back used by the idempotent retry contract.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;
}

/// Inventory collection, queried by product id rather than scanned whole.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Fetches the stock records for the given products in one batched
    /// call. Products without a record are absent from the result.
    async fn find_by_products(
        &self,
        product_ids: &[String],
    ) -> Result<Vec<InventoryLevel>, StoreError>;

    /// Overwrites a record's stock count and bump timestamp.
    async fn update_stock(
        &self,
        record_id: &str,
        stock_quantity: i64,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
