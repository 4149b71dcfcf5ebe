use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status. `Paid` is terminal for this flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
}

/// Settlement status carried on both orders and payment documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

/// One priced line of a checkout snapshot.
///
/// `title`, `image`, `price` and `platform` are resolved from the catalog
/// at snapshot time; `quantity` comes from the cart; `subtotal` is fixed
/// here and never recomputed afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Immutable snapshot handed from the cart to the checkout flow.
///
/// Persisting this inside the order decouples the order's historical total
/// from any later catalog price change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutPayload {
    pub items: Vec<CheckoutLine>,
    pub total: Decimal,
    pub item_count: u32,
}

impl CheckoutPayload {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Order document created by the checkout flow, mutated only by it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<CheckoutLine>,
    pub total: Decimal,
    pub item_count: u32,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a pending order from a checkout snapshot.
    ///
    /// The id is generated client-side so that a retried create is
    /// idempotent rather than a duplicate.
    pub fn pending(user_id: impl Into<String>, payload: &CheckoutPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            items: payload.items.clone(),
            total: payload.total,
            item_count: payload.item_count,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }
}

/// Field set applied to an order once its payment settles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderPaymentUpdate {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl OrderPaymentUpdate {
    pub fn settled(payment_id: Uuid) -> Self {
        Self {
            status: OrderStatus::Paid,
            payment_status: PaymentStatus::Completed,
            payment_id,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload() -> CheckoutPayload {
        let line = CheckoutLine {
            id: "g1".into(),
            title: "Hades II".into(),
            image: None,
            price: dec!(29.99),
            quantity: 2,
            subtotal: dec!(59.98),
            platform: Some("PC".into()),
        };
        CheckoutPayload {
            total: line.subtotal,
            item_count: line.quantity,
            items: vec![line],
        }
    }

    #[test]
    fn pending_order_copies_the_snapshot() {
        let order = Order::pending("user-1", &payload());

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total, dec!(59.98));
        assert_eq!(order.item_count, 2);
        assert_eq!(order.payment_id, None);
        assert!(!order.is_paid());
    }

    #[test]
    fn settled_update_marks_the_order_paid() {
        let payment_id = Uuid::new_v4();
        let update = OrderPaymentUpdate::settled(payment_id);

        assert_eq!(update.status, OrderStatus::Paid);
        assert_eq!(update.payment_status, PaymentStatus::Completed);
        assert_eq!(update.payment_id, payment_id);
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(OrderStatus::Paid.to_string(), "paid");
        assert_eq!(PaymentStatus::Completed.to_string(), "completed");
    }
}
