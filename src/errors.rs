use uuid::Uuid;

use crate::repositories::StoreError;

/// Unified error type returned by every service operation in the crate.
///
/// Checkout variants deliberately name the step that failed so callers can
/// present an accurate retry affordance: `OrderCreation` and `PaymentFailed`
/// happen before any money moves, while `PartialPayment` means a payment
/// document exists and must never be collapsed into a generic payment error.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Checkout payload is empty")]
    EmptyCheckout,

    #[error("Order creation failed: {0}")]
    OrderCreation(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment {payment_id} captured for order {order_id} but the order update failed: {reason}")]
    PartialPayment {
        order_id: Uuid,
        payment_id: Uuid,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Returns the message suitable for direct display to a shopper.
    ///
    /// Failures after payment capture must read differently from failures
    /// before it ("payment received, contact support" vs "try again"), and
    /// infrastructure errors never leak their underlying cause.
    pub fn user_message(&self) -> String {
        match self {
            Self::PartialPayment { order_id, .. } => format!(
                "Your payment was received, but we could not finish updating order {}. \
                 Please contact support before retrying payment.",
                order_id
            ),
            Self::PaymentFailed(_) => {
                "Payment failed. No charge was made; please try again.".to_string()
            }
            Self::OrderCreation(_) => {
                "We could not create your order. Your cart is unchanged; please try again."
                    .to_string()
            }
            Self::AuthRequired => "Please sign in to continue to checkout.".to_string(),
            Self::EmptyCheckout => {
                "None of the items in your cart are currently available.".to_string()
            }
            Self::Store(_) | Self::Other(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// True when retrying the same call cannot duplicate a remote write.
    pub fn retry_is_safe(&self) -> bool {
        !matches!(self, Self::PartialPayment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_payment_is_never_presented_as_a_plain_failure() {
        let order_id = Uuid::new_v4();
        let err = ServiceError::PartialPayment {
            order_id,
            payment_id: Uuid::new_v4(),
            reason: "store write rejected".into(),
        };

        let msg = err.user_message();
        assert!(msg.contains("payment was received"), "got: {}", msg);
        assert!(msg.contains(&order_id.to_string()));
        assert!(!err.retry_is_safe());

        let plain = ServiceError::PaymentFailed("card declined".into());
        assert!(plain.user_message().contains("No charge was made"));
        assert!(plain.retry_is_safe());
    }

    #[test]
    fn infrastructure_messages_hide_internal_details() {
        let err = ServiceError::Store(StoreError::Unavailable("dns lookup failed".into()));
        assert!(!err.user_message().contains("dns"));

        let err: ServiceError = anyhow::anyhow!("channel closed").into();
        assert!(!err.user_message().contains("channel"));
    }

    #[test]
    fn store_and_anyhow_errors_convert() {
        fn returns_store_err() -> Result<(), ServiceError> {
            Err(StoreError::MissingDocument {
                collection: "orders",
                id: "abc".into(),
            })?;
            Ok(())
        }
        assert!(matches!(
            returns_store_err(),
            Err(ServiceError::Store(StoreError::MissingDocument { .. }))
        ));

        let err: ServiceError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, ServiceError::Other(_)));
    }

    #[test]
    fn display_names_the_failed_step() {
        assert_eq!(
            ServiceError::OrderCreation("timeout".into()).to_string(),
            "Order creation failed: timeout"
        );
        assert_eq!(
            ServiceError::Validation("card number must be 16 digits".into()).to_string(),
            "Validation error: card number must be 16 digits"
        );
        assert_eq!(
            ServiceError::AuthRequired.to_string(),
            "Authentication required"
        );
    }
}
