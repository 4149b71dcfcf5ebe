use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog product document as served by the remote store.
///
/// Read-only from this crate's point of view. `available` gates whether a
/// cart line referencing the product survives checkout snapshotting;
/// documents written before the flag existed default to available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub stock: i64,
}

fn default_available() -> bool {
    true
}
