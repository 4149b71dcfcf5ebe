use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{hydrate_items, CartItem},
    storage::LocalStore,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Shopping cart service for the active browsing session.
///
/// Owns the authoritative in-memory cart and mirrors it into the injected
/// [`LocalStore`] after every successful mutation. The mirror is best-effort
/// caching: a persistence failure is recorded and logged but never rolls back
/// the in-memory mutation, and it never fails the operation either.
///
/// The cart holds at most one line per catalog id; adding an id that is
/// already present increments its quantity. Quantities never fall below 1 --
/// a request to go lower is rejected outright, and removal is its own
/// operation.
///
/// All operations require [`initialize`](CartService::initialize) to have run
/// first, so dependents (notably checkout's snapshot path) can never read an
/// empty placeholder state.
pub struct CartService {
    store: Arc<dyn LocalStore>,
    storage_key: String,
    event_sender: Option<Arc<EventSender>>,
    state: RwLock<CartState>,
}

#[derive(Debug, Default)]
struct CartState {
    items: Vec<CartItem>,
    initialized: bool,
    last_persistence_error: Option<String>,
}

/// Item details accepted by [`CartService::add_item`].
///
/// Quantity is not an input: a new line always starts at 1, and repeated
/// adds increment it.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AddToCartInput {
    #[validate(length(min = 1, message = "item id must not be empty"))]
    pub id: String,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl CartService {
    /// Creates a new `CartService` persisting under `storage_key`.
    ///
    /// The cart is unusable until [`initialize`](CartService::initialize)
    /// hydrates it.
    pub fn new(
        store: Arc<dyn LocalStore>,
        storage_key: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            storage_key,
            event_sender,
            state: RwLock::new(CartState::default()),
        }
    }

    /// Hydrates the cart from the local store and marks it initialized.
    ///
    /// Never fails: a missing key starts an empty cart, an unreadable or
    /// corrupt payload is discarded, and invalid entries are dropped one by
    /// one while their valid siblings survive.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let mut state = self.state.write().await;

        match self.store.get(&self.storage_key).await {
            Ok(Some(raw)) => {
                state.items = hydrate_items(&raw);
                state.last_persistence_error = None;
            }
            Ok(None) => {
                state.items = Vec::new();
                state.last_persistence_error = None;
            }
            Err(e) => {
                warn!(error = %e, "cart hydration read failed; starting empty");
                state.items = Vec::new();
                state.last_persistence_error = Some(e.to_string());
            }
        }

        state.initialized = true;
        info!(item_count = state.items.len(), "cart hydrated");
    }

    /// Adds an item to the cart, or increments its quantity if the same
    /// catalog id is already present.
    ///
    /// # Errors
    ///
    /// * `ServiceError::InvalidItem` - empty id or negative price
    /// * `ServiceError::InvalidOperation` - cart not initialized
    #[instrument(skip(self))]
    pub async fn add_item(&self, input: AddToCartInput) -> Result<(), ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidItem(e.to_string()))?;
        if input.id.trim().is_empty() {
            return Err(ServiceError::InvalidItem(
                "item id must not be blank".to_string(),
            ));
        }
        if input.price.is_sign_negative() {
            return Err(ServiceError::InvalidItem(format!(
                "item price must not be negative, got {}",
                input.price
            )));
        }

        let quantity;
        {
            let mut state = self.state.write().await;
            ensure_initialized(&state)?;

            quantity = match state.items.iter_mut().find(|item| item.id == input.id) {
                Some(existing) => {
                    existing.quantity += 1;
                    existing.quantity
                }
                None => {
                    state.items.push(CartItem {
                        id: input.id.clone(),
                        title: input.title,
                        price: input.price,
                        image: input.image,
                        platform: input.platform,
                        quantity: 1,
                    });
                    1
                }
            };

            self.persist(&mut state).await;
        }

        self.emit(Event::CartItemAdded {
            product_id: input.id.clone(),
            quantity,
        })
        .await;

        info!(product_id = %input.id, quantity, "added item to cart");
        Ok(())
    }

    /// Removes the line matching `id` (0 or 1 by invariant). Removing an
    /// absent id is a no-op that still persists.
    ///
    /// # Errors
    ///
    /// * `ServiceError::InvalidArgument` - empty id
    /// * `ServiceError::InvalidOperation` - cart not initialized
    #[instrument(skip(self))]
    pub async fn remove_item(&self, id: &str) -> Result<(), ServiceError> {
        if id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "item id must not be empty".to_string(),
            ));
        }

        let removed;
        {
            let mut state = self.state.write().await;
            ensure_initialized(&state)?;
            let before = state.items.len();
            state.items.retain(|item| item.id != id);
            removed = state.items.len() < before;
            self.persist(&mut state).await;
        }

        if removed {
            self.emit(Event::CartItemRemoved {
                product_id: id.to_string(),
            })
            .await;
            info!(product_id = %id, "removed item from cart");
        }
        Ok(())
    }

    /// Sets the quantity of the line matching `id`. Quantities below 1 are
    /// rejected and leave the prior quantity unchanged; callers with
    /// zero/negative intent must use [`remove_item`](CartService::remove_item)
    /// instead. An absent id is a no-op.
    ///
    /// # Errors
    ///
    /// * `ServiceError::InvalidArgument` - empty id or `new_quantity < 1`
    /// * `ServiceError::InvalidOperation` - cart not initialized
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, id: &str, new_quantity: u32) -> Result<(), ServiceError> {
        if id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "item id must not be empty".to_string(),
            ));
        }
        if new_quantity < 1 {
            return Err(ServiceError::InvalidArgument(format!(
                "quantity must be at least 1, got {}; use remove_item to delete a line",
                new_quantity
            )));
        }

        let changed;
        {
            let mut state = self.state.write().await;
            ensure_initialized(&state)?;
            changed = match state.items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.quantity = new_quantity;
                    true
                }
                None => false,
            };
            self.persist(&mut state).await;
        }

        if changed {
            self.emit(Event::CartQuantityChanged {
                product_id: id.to_string(),
                quantity: new_quantity,
            })
            .await;
        }
        Ok(())
    }

    /// Empties the cart and deletes the persisted copy. Invoked by the
    /// checkout flow exactly once on completion, or directly by the shopper.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), ServiceError> {
        {
            let mut state = self.state.write().await;
            ensure_initialized(&state)?;
            state.items.clear();

            match self.store.remove(&self.storage_key).await {
                Ok(()) => state.last_persistence_error = None,
                Err(e) => {
                    warn!(error = %e, "failed to delete persisted cart");
                    state.last_persistence_error = Some(e.to_string());
                }
            }
        }

        self.emit(Event::CartCleared).await;
        info!("cart cleared");
        Ok(())
    }

    /// Ordered snapshot of the current items.
    pub async fn items(&self) -> Result<Vec<CartItem>, ServiceError> {
        let state = self.state.read().await;
        ensure_initialized(&state)?;
        Ok(state.items.clone())
    }

    /// Sum of `price x quantity` over all current items.
    pub async fn total(&self) -> Result<Decimal, ServiceError> {
        let state = self.state.read().await;
        ensure_initialized(&state)?;
        Ok(state.items.iter().map(CartItem::subtotal).sum())
    }

    /// Sum of quantities over all current items.
    pub async fn item_count(&self) -> Result<u32, ServiceError> {
        let state = self.state.read().await;
        ensure_initialized(&state)?;
        Ok(state.items.iter().map(|item| item.quantity).sum())
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Most recent local-store failure, if the last persisting operation had
    /// one. Cleared by the next successful persist.
    pub async fn last_persistence_error(&self) -> Option<String> {
        self.state.read().await.last_persistence_error.clone()
    }

    // Mirrors the in-memory items into the local store. Failure is recorded,
    // never propagated: the in-memory cart stays authoritative.
    async fn persist(&self, state: &mut CartState) {
        let payload = match serde_json::to_string(&state.items) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize cart for persistence");
                state.last_persistence_error = Some(e.to_string());
                return;
            }
        };

        match self.store.set(&self.storage_key, &payload).await {
            Ok(()) => state.last_persistence_error = None,
            Err(e) => {
                warn!(error = %e, "failed to persist cart");
                state.last_persistence_error = Some(e.to_string());
            }
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }
}

fn ensure_initialized(state: &CartState) -> Result<(), ServiceError> {
    if state.initialized {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(
            "cart is not initialized".to_string(),
        ))
    }
}
