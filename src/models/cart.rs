use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A single cart line for the active session.
///
/// The cart holds at most one entry per catalog `id`; adding the same
/// product again increments `quantity` instead of appending. `image` is an
/// opaque reference resolved by the host application's asset mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    /// Line subtotal at the item's recorded price.
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Decodes one persisted entry, enforcing the cart-item invariant:
    /// non-empty `id`, integer `quantity >= 1`, numeric `price >= 0`.
    /// Returns `None` for anything else; invalid entries are dropped at
    /// hydration, never repaired.
    pub fn from_persisted(value: &Value) -> Option<Self> {
        let item: CartItem = serde_json::from_value(value.clone()).ok()?;
        if item.id.trim().is_empty() {
            return None;
        }
        if item.quantity < 1 {
            return None;
        }
        if item.price.is_sign_negative() {
            return None;
        }
        Some(item)
    }
}

/// Filters a persisted cart payload down to its valid entries.
///
/// An unparseable or non-array payload hydrates as an empty cart rather
/// than failing the session, and one corrupt entry never discards its
/// valid siblings.
pub fn hydrate_items(raw: &str) -> Vec<CartItem> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "discarding unparseable cart payload");
            return Vec::new();
        }
    };

    let entries = match parsed {
        Value::Array(entries) => entries,
        other => {
            debug!(payload_type = %json_type_name(&other), "discarding non-array cart payload");
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| {
            let item = CartItem::from_persisted(entry);
            if item.is_none() {
                debug!(%entry, "dropping invalid cart entry");
            }
            item
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
