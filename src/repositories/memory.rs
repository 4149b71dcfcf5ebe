//! In-process document store used by tests, demos, and host applications
//! that want the storefront running before a real backend exists.
//!
//! Documents are held as raw JSON values per collection and decoded at
//! every read, so the typed-validation boundary behaves exactly like a
//! remote store returning untrusted data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{InventoryLevel, Order, OrderPaymentUpdate, Payment, Product};

use super::{
    CatalogRepository, InventoryRepository, OrderRepository, PaymentRepository, StoreError,
};

const CATALOG: &str = "catalog";
const ORDERS: &str = "orders";
const PAYMENTS: &str = "payments";
const INVENTORY: &str = "inventory";

#[derive(Debug, Default)]
pub struct InMemoryStore {
    catalog: DashMap<String, Value>,
    orders: DashMap<String, Value>,
    payments: DashMap<String, Value>,
    inventory: DashMap<String, Value>,
}

fn encode<T: Serialize>(collection: &'static str, doc: &T) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::WriteRejected {
        collection,
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(
    collection: &'static str,
    id: &str,
    value: &Value,
) -> Result<T, StoreError> {
    serde_json::from_value(value.clone()).map_err(|source| StoreError::Malformed {
        collection,
        id: id.to_string(),
        source,
    })
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalog product.
    pub fn seed_product(&self, product: &Product) -> Result<(), StoreError> {
        let doc = encode(CATALOG, product)?;
        self.catalog.insert(product.id.clone(), doc);
        Ok(())
    }

    /// Inserts or replaces an inventory record.
    pub fn seed_inventory(&self, level: &InventoryLevel) -> Result<(), StoreError> {
        let doc = encode(INVENTORY, level)?;
        self.inventory.insert(level.id.clone(), doc);
        Ok(())
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.catalog.get(id.as_str()) {
                found.push(decode(CATALOG, id, doc.value())?);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let doc = encode(ORDERS, order)?;
        self.orders.insert(order.id.to_string(), doc);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let key = id.to_string();
        match self.orders.get(&key) {
            Some(doc) => Ok(Some(decode(ORDERS, &key, doc.value())?)),
            None => Ok(None),
        }
    }

    async fn apply_payment(&self, id: Uuid, update: &OrderPaymentUpdate) -> Result<(), StoreError> {
        let key = id.to_string();
        let current = match self.orders.get(&key) {
            Some(doc) => doc.value().clone(),
            None => {
                return Err(StoreError::MissingDocument {
                    collection: ORDERS,
                    id: key,
                })
            }
        };

        let mut order: Order = decode(ORDERS, &key, &current)?;
        order.status = update.status;
        order.payment_status = update.payment_status;
        order.payment_id = Some(update.payment_id);
        order.updated_at = Some(update.updated_at);

        let doc = encode(ORDERS, &order)?;
        self.orders.insert(key, doc);
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create(&self, payment: &Payment) -> Result<(), StoreError> {
        let doc = encode(PAYMENTS, payment)?;
        self.payments.insert(payment.id.to_string(), doc);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let key = id.to_string();
        match self.payments.get(&key) {
            Some(doc) => Ok(Some(decode(PAYMENTS, &key, doc.value())?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn find_by_products(
        &self,
        product_ids: &[String],
    ) -> Result<Vec<InventoryLevel>, StoreError> {
        // A real backend would serve this as an indexed query; scanning is
        // acceptable for an in-process store.
        let mut found = Vec::new();
        for entry in self.inventory.iter() {
            let level: InventoryLevel = decode(INVENTORY, entry.key(), entry.value())?;
            if product_ids.contains(&level.product_id) {
                found.push(level);
            }
        }
        Ok(found)
    }

    async fn update_stock(
        &self,
        record_id: &str,
        stock_quantity: i64,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let current = match self.inventory.get(record_id) {
            Some(doc) => doc.value().clone(),
            None => {
                return Err(StoreError::MissingDocument {
                    collection: INVENTORY,
                    id: record_id.to_string(),
                })
            }
        };

        let mut level: InventoryLevel = decode(INVENTORY, record_id, &current)?;
        level.stock_quantity = stock_quantity;
        level.last_updated = last_updated;

        let doc = encode(INVENTORY, &level)?;
        self.inventory.insert(record_id.to_string(), doc);
        Ok(())
    }
}
