use crate::{
    auth::IdentityProvider,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        CheckoutLine, CheckoutPayload, InventoryLevel, Order, OrderPaymentUpdate, OrderStatus,
        Payment, PaymentDetails, PaymentMethod, Product,
    },
    repositories::{CatalogRepository, InventoryRepository, OrderRepository, PaymentRepository},
    services::commerce::CartService,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Checkout coordinator: turns a cart snapshot into a durable order.
///
/// The flow is a linear state machine over several remote writes that are
/// deliberately NOT wrapped in one transaction -- the document store this
/// design targets has no cross-collection transactions. Ordering minimizes
/// customer-visible harm: the order document exists before any money moves,
/// payment settles before inventory is touched, and inventory may
/// under-decrement on a late failure but the customer is never over-charged.
///
/// Remote writes are never silently retried. Order and payment documents
/// carry client-generated ids, and payment capture reads its id back before
/// creating, so a caller-driven retry after a partial failure cannot
/// duplicate documents.
pub struct CheckoutService {
    cart: Arc<CartService>,
    catalog: Arc<dyn CatalogRepository>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    inventory: Arc<dyn InventoryRepository>,
    identity: Arc<dyn IdentityProvider>,
    event_sender: Option<Arc<EventSender>>,
    session_ttl: Duration,
    sessions: DashMap<Uuid, CheckoutSession>,
    // One in-flight checkout per user; resolves the double-submit race.
    in_flight: DashMap<String, Uuid>,
}

/// Steps of the checkout state machine. `Errored` is reachable from any of
/// the working steps; a session parked there can be retried or cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckoutStep {
    Idle,
    Snapshotting,
    CreatingOrder,
    AwaitingPayment,
    ProcessingPayment,
    ReconcilingInventory,
    Completed,
    Errored,
}

/// A cart line dropped at snapshot time, reported rather than silently
/// included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableItem {
    pub product_id: String,
    pub reason: String,
}

/// A per-line inventory decrement that failed after payment was captured.
/// Non-fatal: surfaced on the receipt for an out-of-band reconciliation job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationWarning {
    pub product_id: String,
    pub reason: String,
}

/// Outcome of a completed checkout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub warnings: Vec<ReconciliationWarning>,
}

/// An open checkout, parked at [`CheckoutStep::AwaitingPayment`] after
/// [`CheckoutService::begin_checkout`] until payment is submitted, cancelled,
/// or the session expires.
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: Uuid,
    /// Client-generated ahead of capture so a retried submit stays idempotent.
    pub payment_id: Uuid,
    pub payload: CheckoutPayload,
    pub dropped: Vec<UnavailableItem>,
    pub step: CheckoutStep,
    pub receipt: Option<CheckoutReceipt>,
    pub created_at: DateTime<Utc>,
}

/// Payment details as entered by the shopper. Validated locally before any
/// remote call; only redacted data leaves this type.
#[derive(Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInput {
    CreditCard {
        number: String,
        expiry: String,
        cvv: String,
        cardholder: String,
    },
    Paypal {
        email: String,
    },
}

// Card data stays out of logs and error output.
impl fmt::Debug for PaymentInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreditCard { cardholder, .. } => f
                .debug_struct("CreditCard")
                .field("cardholder", cardholder)
                .finish_non_exhaustive(),
            Self::Paypal { .. } => f.debug_struct("Paypal").finish_non_exhaustive(),
        }
    }
}

static CARD_NUMBER_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{16}$").expect("card number regex"));
static EXPIRY_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0[1-9]|1[0-2])/\d{2}$").expect("expiry regex"));
static CVV_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,4}$").expect("cvv regex"));
static EMAIL_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

impl PaymentInput {
    /// Validates the raw input and converts it into the stored method and
    /// redacted details.
    pub(crate) fn validated(&self) -> Result<(PaymentMethod, PaymentDetails), ServiceError> {
        match self {
            Self::CreditCard {
                number,
                expiry,
                cvv,
                cardholder,
            } => {
                let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
                if !CARD_NUMBER_FORMAT.is_match(&digits) {
                    return Err(ServiceError::Validation(
                        "card number must be 16 digits".to_string(),
                    ));
                }
                if !EXPIRY_FORMAT.is_match(expiry) {
                    return Err(ServiceError::Validation(
                        "expiry must be in MM/YY format".to_string(),
                    ));
                }
                if !CVV_FORMAT.is_match(cvv) {
                    return Err(ServiceError::Validation(
                        "CVV must be 3 or 4 digits".to_string(),
                    ));
                }
                if cardholder.trim().is_empty() {
                    return Err(ServiceError::Validation(
                        "cardholder name must not be empty".to_string(),
                    ));
                }
                Ok((
                    PaymentMethod::CreditCard,
                    PaymentDetails::masked_card(&digits, cardholder.trim()),
                ))
            }
            Self::Paypal { email } => {
                let email = email.trim();
                if !EMAIL_FORMAT.is_match(email) {
                    return Err(ServiceError::Validation(
                        "PayPal account email is not valid".to_string(),
                    ));
                }
                Ok((
                    PaymentMethod::Paypal,
                    PaymentDetails::Paypal {
                        email: email.to_string(),
                    },
                ))
            }
        }
    }
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cart: Arc<CartService>,
        catalog: Arc<dyn CatalogRepository>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        inventory: Arc<dyn InventoryRepository>,
        identity: Arc<dyn IdentityProvider>,
        event_sender: Option<Arc<EventSender>>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            cart,
            catalog,
            orders,
            payments,
            inventory,
            identity,
            event_sender,
            session_ttl,
            sessions: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Starts a checkout: snapshots the cart against the latest catalog data
    /// and persists the pending order document.
    ///
    /// On success the returned session is parked at
    /// [`CheckoutStep::AwaitingPayment`]; the cart itself is untouched until
    /// the whole flow completes. Cart lines whose catalog id no longer
    /// resolves or is marked unavailable are dropped from the payload and
    /// reported on the session's `dropped` list.
    ///
    /// # Errors
    ///
    /// * `ServiceError::AuthRequired` - nobody is signed in; recoverable, no
    ///   state is created, and the caller hands control to the login flow
    /// * `ServiceError::InvalidOperation` - cart uninitialized or empty, or a
    ///   checkout is already in flight for this user
    /// * `ServiceError::EmptyCheckout` - every line was dropped; no remote
    ///   write happened
    /// * `ServiceError::OrderCreation` - the order document could not be
    ///   persisted; cart intact, no session retained
    #[instrument(skip(self))]
    pub async fn begin_checkout(&self) -> Result<CheckoutSession, ServiceError> {
        self.sweep_expired();

        let user = self.identity.current_user().ok_or(ServiceError::AuthRequired)?;

        let items = self.cart.items().await?;
        if items.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "cart is empty".to_string(),
            ));
        }

        let session_id = Uuid::new_v4();
        self.acquire_guard(&user.id, session_id)?;

        // Snapshotting: one batched catalog lookup for the whole cart.
        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let products = match self.catalog.find_by_ids(&ids).await {
            Ok(products) => products,
            Err(e) => {
                self.release_guard(&user.id, session_id);
                error!(error = %e, "catalog lookup failed while snapshotting cart");
                return Err(e.into());
            }
        };
        let by_id: HashMap<&str, &Product> =
            products.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut lines = Vec::with_capacity(items.len());
        let mut dropped = Vec::new();
        for item in &items {
            match by_id.get(item.id.as_str()) {
                Some(product) if product.available => lines.push(CheckoutLine {
                    id: product.id.clone(),
                    title: product.title.clone(),
                    image: product.image.clone(),
                    price: product.price,
                    quantity: item.quantity,
                    subtotal: product.price * Decimal::from(item.quantity),
                    platform: product.platform.clone(),
                }),
                Some(_) => {
                    warn!(product_id = %item.id, "dropping unavailable product from checkout");
                    dropped.push(UnavailableItem {
                        product_id: item.id.clone(),
                        reason: "product is not available".to_string(),
                    });
                }
                None => {
                    warn!(product_id = %item.id, "dropping unknown product from checkout");
                    dropped.push(UnavailableItem {
                        product_id: item.id.clone(),
                        reason: "product no longer exists in the catalog".to_string(),
                    });
                }
            }
        }

        let payload = CheckoutPayload {
            total: lines.iter().map(|line| line.subtotal).sum(),
            item_count: lines.iter().map(|line| line.quantity).sum(),
            items: lines,
        };
        if payload.is_empty() {
            self.release_guard(&user.id, session_id);
            return Err(ServiceError::EmptyCheckout);
        }

        self.emit(Event::CheckoutStarted {
            session_id,
            item_count: payload.item_count,
        })
        .await;

        // CreatingOrder: the one write that must exist before money moves.
        let order = Order::pending(&user.id, &payload);
        if let Err(e) = self.orders.create(&order).await {
            self.release_guard(&user.id, session_id);
            error!(order_id = %order.id, error = %e, "order creation failed");
            self.emit(Event::CheckoutFailed {
                session_id,
                step: CheckoutStep::CreatingOrder.to_string(),
                reason: e.to_string(),
            })
            .await;
            return Err(ServiceError::OrderCreation(e.to_string()));
        }
        self.emit(Event::OrderCreated(order.id)).await;

        let session = CheckoutSession {
            id: session_id,
            user_id: user.id,
            order_id: order.id,
            payment_id: Uuid::new_v4(),
            payload,
            dropped,
            step: CheckoutStep::AwaitingPayment,
            receipt: None,
            created_at: Utc::now(),
        };
        self.sessions.insert(session_id, session.clone());

        info!(
            %session_id,
            order_id = %session.order_id,
            total = %session.payload.total,
            dropped = session.dropped.len(),
            "checkout session awaiting payment"
        );
        Ok(session)
    }

    /// Submits payment for an open session and drives the flow to
    /// completion: payment capture, order settlement, inventory
    /// reconciliation, cart clear.
    ///
    /// Re-submitting a completed session returns its stored receipt
    /// unchanged. Re-submitting after an error retries from where the flow
    /// stopped without duplicating payment documents (the payment id is read
    /// back before creating).
    ///
    /// # Errors
    ///
    /// * `ServiceError::NotFound` - unknown session id
    /// * `ServiceError::InvalidOperation` - session expired or not awaiting
    ///   payment
    /// * `ServiceError::Validation` - malformed payment input; nothing was
    ///   sent remotely and the session stays retryable
    /// * `ServiceError::PaymentFailed` - payment capture failed; no money
    ///   moved, retry is safe
    /// * `ServiceError::PartialPayment` - payment captured but the order
    ///   update failed; money HAS moved and the cart is left intact
    #[instrument(skip(self, input))]
    pub async fn submit_payment(
        &self,
        session_id: Uuid,
        input: PaymentInput,
    ) -> Result<CheckoutReceipt, ServiceError> {
        let session = self
            .sessions
            .get(&session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("checkout session {} not found", session_id))
            })?;

        if session.step == CheckoutStep::Completed {
            return session.receipt.clone().ok_or_else(|| {
                ServiceError::InvalidOperation(
                    "completed checkout session has no receipt".to_string(),
                )
            });
        }
        if self.is_expired(&session) {
            self.sessions.remove(&session_id);
            self.release_guard(&session.user_id, session_id);
            return Err(ServiceError::InvalidOperation(format!(
                "checkout session {} has expired",
                session_id
            )));
        }
        if !matches!(
            session.step,
            CheckoutStep::AwaitingPayment | CheckoutStep::Errored
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "checkout session {} is not awaiting payment",
                session_id
            )));
        }

        // Fails fast, before any remote call; the session stays retryable.
        let (method, details) = input.validated()?;

        self.set_step(session_id, CheckoutStep::ProcessingPayment);
        if let Err(e) = self.capture_payment(&session, method, details).await {
            self.set_step(session_id, CheckoutStep::Errored);
            self.emit(Event::CheckoutFailed {
                session_id,
                step: CheckoutStep::ProcessingPayment.to_string(),
                reason: e.to_string(),
            })
            .await;
            return Err(e);
        }

        self.set_step(session_id, CheckoutStep::ReconcilingInventory);
        let warnings = self.reconcile_inventory(&session.payload).await;

        self.cart.clear().await?;

        let receipt = CheckoutReceipt {
            order_id: session.order_id,
            payment_id: session.payment_id,
            amount: session.payload.total,
            warnings,
        };
        if let Some(mut stored) = self.sessions.get_mut(&session_id) {
            stored.step = CheckoutStep::Completed;
            stored.receipt = Some(receipt.clone());
        }
        self.release_guard(&session.user_id, session_id);

        self.emit(Event::CheckoutCompleted {
            session_id,
            order_id: session.order_id,
        })
        .await;
        info!(
            %session_id,
            order_id = %session.order_id,
            amount = %receipt.amount,
            warning_count = receipt.warnings.len(),
            "checkout completed"
        );
        Ok(receipt)
    }

    /// Abandons a session parked before completion and releases the per-user
    /// guard. The order document committed at begin-checkout stays behind;
    /// the design accepts the orphan rather than risking a blind delete.
    #[instrument(skip(self))]
    pub async fn cancel_checkout(&self, session_id: Uuid) -> Result<(), ServiceError> {
        let session = self
            .sessions
            .get(&session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("checkout session {} not found", session_id))
            })?;
        if session.step == CheckoutStep::Completed {
            return Err(ServiceError::InvalidOperation(
                "completed checkout cannot be cancelled".to_string(),
            ));
        }

        self.sessions.remove(&session_id);
        self.release_guard(&session.user_id, session_id);
        self.emit(Event::CheckoutCancelled { session_id }).await;
        info!(%session_id, order_id = %session.order_id, "checkout cancelled");
        Ok(())
    }

    /// Current view of a session, if it is still held.
    pub fn session(&self, session_id: Uuid) -> Option<CheckoutSession> {
        self.sessions.get(&session_id).map(|entry| entry.clone())
    }

    // Payment capture plus order settlement, both idempotent via read-back.
    // Everything after the payment document exists maps to PartialPayment.
    async fn capture_payment(
        &self,
        session: &CheckoutSession,
        method: PaymentMethod,
        details: PaymentDetails,
    ) -> Result<(), ServiceError> {
        let already_captured = self
            .payments
            .find_by_id(session.payment_id)
            .await
            .map_err(|e| {
                error!(payment_id = %session.payment_id, error = %e, "payment read-back failed");
                ServiceError::PaymentFailed(e.to_string())
            })?
            .is_some();

        if !already_captured {
            let payment = Payment::captured(
                session.payment_id,
                session.order_id,
                session.user_id.clone(),
                session.payload.total,
                method,
                details,
            );
            self.payments.create(&payment).await.map_err(|e| {
                error!(order_id = %session.order_id, error = %e, "payment creation failed");
                ServiceError::PaymentFailed(e.to_string())
            })?;
            self.emit(Event::PaymentCaptured {
                payment_id: payment.id,
                order_id: session.order_id,
                amount: payment.amount,
            })
            .await;
        }

        let already_paid = matches!(
            self.orders.find_by_id(session.order_id).await,
            Ok(Some(order)) if order.is_paid()
        );
        if !already_paid {
            self.orders
                .apply_payment(
                    session.order_id,
                    &OrderPaymentUpdate::settled(session.payment_id),
                )
                .await
                .map_err(|e| {
                    error!(
                        order_id = %session.order_id,
                        payment_id = %session.payment_id,
                        error = %e,
                        "order update failed after payment capture"
                    );
                    ServiceError::PartialPayment {
                        order_id: session.order_id,
                        payment_id: session.payment_id,
                        reason: e.to_string(),
                    }
                })?;
            self.emit(Event::OrderStatusChanged {
                order_id: session.order_id,
                old_status: OrderStatus::Pending.to_string(),
                new_status: OrderStatus::Paid.to_string(),
            })
            .await;
        }

        Ok(())
    }

    // Post-payment bookkeeping: lines settle independently and concurrently,
    // and failures are collected rather than raced to a first-error abort.
    // Nothing here can fail the checkout; payment has already been captured.
    async fn reconcile_inventory(&self, payload: &CheckoutPayload) -> Vec<ReconciliationWarning> {
        let ids: Vec<String> = payload.items.iter().map(|line| line.id.clone()).collect();
        let levels = match self.inventory.find_by_products(&ids).await {
            Ok(levels) => levels,
            Err(e) => {
                warn!(error = %e, "inventory lookup failed; skipping reconciliation");
                return payload
                    .items
                    .iter()
                    .map(|line| ReconciliationWarning {
                        product_id: line.id.clone(),
                        reason: format!("inventory lookup failed: {}", e),
                    })
                    .collect();
            }
        };
        let by_product: HashMap<&str, &InventoryLevel> = levels
            .iter()
            .map(|level| (level.product_id.as_str(), level))
            .collect();

        let updates = payload.items.iter().map(|line| {
            let level = by_product.get(line.id.as_str()).map(|level| (*level).clone());
            async move {
                let Some(level) = level else {
                    return Err(ReconciliationWarning {
                        product_id: line.id.clone(),
                        reason: "no inventory record for product".to_string(),
                    });
                };
                let new_quantity = level.stock_quantity - i64::from(line.quantity);
                match self
                    .inventory
                    .update_stock(&level.id, new_quantity, Utc::now())
                    .await
                {
                    Ok(()) => Ok((line.id.clone(), level.stock_quantity, new_quantity)),
                    Err(e) => Err(ReconciliationWarning {
                        product_id: line.id.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
        });

        let mut warnings = Vec::new();
        for outcome in join_all(updates).await {
            match outcome {
                Ok((product_id, old_quantity, new_quantity)) => {
                    if new_quantity < 0 {
                        warn!(product_id = %product_id, new_quantity, "inventory oversold");
                    }
                    self.emit(Event::InventoryAdjusted {
                        product_id,
                        old_quantity,
                        new_quantity,
                    })
                    .await;
                }
                Err(warning) => {
                    warn!(
                        product_id = %warning.product_id,
                        reason = %warning.reason,
                        "inventory decrement failed for line"
                    );
                    warnings.push(warning);
                }
            }
        }
        warnings
    }

    // Check-and-claim happens under the entry lock, so two concurrent
    // begin-checkout calls for one user cannot both pass. Lock order is
    // `in_flight` then `sessions`; no caller touches `in_flight` while
    // holding a `sessions` ref.
    fn acquire_guard(&self, user_id: &str, session_id: Uuid) -> Result<(), ServiceError> {
        match self.in_flight.entry(user_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(session_id);
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let existing_id = *slot.get();
                let stale = match self.sessions.get(&existing_id) {
                    Some(session) => {
                        session.step == CheckoutStep::Completed || self.is_expired(&session)
                    }
                    None => true,
                };
                if !stale {
                    return Err(ServiceError::InvalidOperation(format!(
                        "a checkout is already in flight for user {}",
                        user_id
                    )));
                }
                self.sessions.remove(&existing_id);
                slot.insert(session_id);
                Ok(())
            }
        }
    }

    fn release_guard(&self, user_id: &str, session_id: Uuid) {
        self.in_flight.remove_if(user_id, |_, id| *id == session_id);
    }

    // Completed and abandoned sessions are kept for the TTL so their receipts
    // stay retrievable, then dropped on the next checkout. Every session
    // insert is preceded by a sweep, which bounds the map in a long-running
    // process.
    fn sweep_expired(&self) {
        let expired: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| self.is_expired(entry.value()))
            .map(|entry| *entry.key())
            .collect();
        for id in expired {
            if let Some((_, session)) = self.sessions.remove(&id) {
                self.release_guard(&session.user_id, id);
            }
        }
    }

    fn is_expired(&self, session: &CheckoutSession) -> bool {
        Utc::now() - session.created_at > self.session_ttl
    }

    fn set_step(&self, session_id: Uuid, step: CheckoutStep) {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.step = step;
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockIdentityProvider;
    use crate::repositories::{
        MockCatalogRepository, MockInventoryRepository, MockOrderRepository,
        MockPaymentRepository,
    };
    use crate::storage::InMemoryLocalStore;
    use assert_matches::assert_matches;
    use test_case::test_case;

    // ==================== Payment Input Validation ====================

    fn card(number: &str, expiry: &str, cvv: &str, cardholder: &str) -> PaymentInput {
        PaymentInput::CreditCard {
            number: number.to_string(),
            expiry: expiry.to_string(),
            cvv: cvv.to_string(),
            cardholder: cardholder.to_string(),
        }
    }

    #[test_case("4242424242424242", "12/27", "123", "Ada Lovelace" => true; "valid card")]
    #[test_case("4242 4242 4242 4242", "01/30", "1234", "Ada" => true; "spaces stripped and four digit cvv")]
    #[test_case("42424242", "12/27", "123", "Ada" => false; "number too short")]
    #[test_case("42424242424242424242", "12/27", "123", "Ada" => false; "number too long")]
    #[test_case("4242abcd42424242", "12/27", "123", "Ada" => false; "number with letters")]
    #[test_case("4242424242424242", "13/27", "123", "Ada" => false; "month out of range")]
    #[test_case("4242424242424242", "00/27", "123", "Ada" => false; "month zero")]
    #[test_case("4242424242424242", "1/27", "123", "Ada" => false; "single digit month")]
    #[test_case("4242424242424242", "12-27", "123", "Ada" => false; "wrong separator")]
    #[test_case("4242424242424242", "12/27", "12", "Ada" => false; "cvv too short")]
    #[test_case("4242424242424242", "12/27", "12345", "Ada" => false; "cvv too long")]
    #[test_case("4242424242424242", "12/27", "123", "   " => false; "blank cardholder")]
    fn card_validation(number: &str, expiry: &str, cvv: &str, cardholder: &str) -> bool {
        card(number, expiry, cvv, cardholder).validated().is_ok()
    }

    #[test_case("shopper@example.com" => true; "valid email")]
    #[test_case("  shopper@example.com  " => true; "surrounding whitespace trimmed")]
    #[test_case("shopper" => false; "missing domain")]
    #[test_case("shopper@example" => false; "missing tld")]
    #[test_case("shop per@example.com" => false; "embedded space")]
    #[test_case("" => false; "empty")]
    fn paypal_validation(email: &str) -> bool {
        PaymentInput::Paypal {
            email: email.to_string(),
        }
        .validated()
        .is_ok()
    }

    #[test]
    fn validated_card_details_are_redacted() {
        let (method, details) = card("4242 4242 4242 4242", "12/27", "123", " Ada Lovelace ")
            .validated()
            .unwrap();

        assert_eq!(method, PaymentMethod::CreditCard);
        assert_matches!(details, PaymentDetails::Card { masked_number, cardholder } => {
            assert_eq!(masked_number, "****4242");
            assert_eq!(cardholder, "Ada Lovelace");
        });
    }

    #[test]
    fn debug_output_never_contains_card_data() {
        let input = card("4242424242424242", "12/27", "123", "Ada");
        let debug = format!("{:?}", input);
        assert!(!debug.contains("4242"));
        assert!(!debug.contains("123"));
        assert!(debug.contains("Ada"));
    }

    #[test]
    fn step_display_is_snake_case() {
        assert_eq!(CheckoutStep::AwaitingPayment.to_string(), "awaiting_payment");
        assert_eq!(
            CheckoutStep::ReconcilingInventory.to_string(),
            "reconciling_inventory"
        );
    }

    // ==================== Guard and Auth Paths ====================

    fn mock_service(identity: MockIdentityProvider, cart: Arc<CartService>) -> CheckoutService {
        CheckoutService::new(
            cart,
            Arc::new(MockCatalogRepository::new()),
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockInventoryRepository::new()),
            Arc::new(identity),
            None,
            Duration::minutes(30),
        )
    }

    async fn cart_with_item() -> Arc<CartService> {
        let cart = Arc::new(CartService::new(
            Arc::new(InMemoryLocalStore::new()),
            "cart".to_string(),
            None,
        ));
        cart.initialize().await;
        cart.add_item(crate::services::commerce::AddToCartInput {
            id: "g1".to_string(),
            title: "Game".to_string(),
            price: rust_decimal_macros::dec!(10.00),
            image: None,
            platform: None,
        })
        .await
        .unwrap();
        cart
    }

    #[tokio::test]
    async fn begin_checkout_requires_a_signed_in_user() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_current_user().returning(|| None);

        let service = mock_service(identity, cart_with_item().await);
        assert_matches!(
            service.begin_checkout().await,
            Err(ServiceError::AuthRequired)
        );
    }

    #[tokio::test]
    async fn begin_checkout_rejects_an_empty_cart() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_current_user()
            .returning(|| Some(crate::auth::CustomerIdentity::new("user-1")));

        let cart = Arc::new(CartService::new(
            Arc::new(InMemoryLocalStore::new()),
            "cart".to_string(),
            None,
        ));
        cart.initialize().await;

        let service = mock_service(identity, cart);
        assert_matches!(
            service.begin_checkout().await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn begin_checkout_requires_an_initialized_cart() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_current_user()
            .returning(|| Some(crate::auth::CustomerIdentity::new("user-1")));

        let cart = Arc::new(CartService::new(
            Arc::new(InMemoryLocalStore::new()),
            "cart".to_string(),
            None,
        ));

        let service = mock_service(identity, cart);
        assert_matches!(
            service.begin_checkout().await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn submitting_to_an_unknown_session_is_not_found() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_current_user().returning(|| None);

        let service = mock_service(identity, cart_with_item().await);
        assert_matches!(
            service
                .submit_payment(Uuid::new_v4(), card("4242424242424242", "12/27", "123", "Ada"))
                .await,
            Err(ServiceError::NotFound(_))
        );
    }
}
