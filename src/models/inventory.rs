use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock record for one catalog product.
///
/// `id` is the document's own identifier in the inventory collection;
/// `product_id` links it to the catalog. Stock is signed so that an
/// oversell (decrement racing a low stock level) stays visible to
/// reconciliation instead of being clamped away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub id: String,
    pub product_id: String,
    pub stock_quantity: i64,
    pub last_updated: DateTime<Utc>,
}

impl InventoryLevel {
    pub fn new(id: impl Into<String>, product_id: impl Into<String>, stock_quantity: i64) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            stock_quantity,
            last_updated: Utc::now(),
        }
    }
}
