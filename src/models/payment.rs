use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::PaymentStatus;

/// Payment method accepted at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
}

/// Redacted payment details persisted with a payment document.
///
/// Raw card data never reaches the store: only the masked number and the
/// cardholder name survive, or the PayPal account email.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentDetails {
    Card {
        masked_number: String,
        cardholder: String,
    },
    Paypal {
        email: String,
    },
}

impl PaymentDetails {
    /// Builds the stored card details, keeping only the last four digits.
    /// `digits` must already be validated as digits-only.
    pub fn masked_card(digits: &str, cardholder: impl Into<String>) -> Self {
        let skip = digits.chars().count().saturating_sub(4);
        let last_four: String = digits.chars().skip(skip).collect();
        Self::Card {
            masked_number: format!("****{}", last_four),
            cardholder: cardholder.into(),
        }
    }
}

/// Payment document. Created once per order and references it by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub details: PaymentDetails,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a captured payment record for the given order.
    pub fn captured(
        id: Uuid,
        order_id: Uuid,
        user_id: impl Into<String>,
        amount: Decimal,
        method: PaymentMethod,
        details: PaymentDetails,
    ) -> Self {
        Self {
            id,
            order_id,
            user_id: user_id.into(),
            amount,
            method,
            status: PaymentStatus::Completed,
            details,
            created_at: Utc::now(),
        }
    }
}
