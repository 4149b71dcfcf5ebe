#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use uuid::Uuid;

use storefront_core::auth::{CustomerIdentity, SessionIdentity};
use storefront_core::models::{InventoryLevel, Order, OrderPaymentUpdate, Payment, Product};
use storefront_core::repositories::{
    InMemoryStore, InventoryRepository, OrderRepository, PaymentRepository, StoreError,
};
use storefront_core::services::commerce::{AddToCartInput, CartService, CheckoutService, PaymentInput};
use storefront_core::storage::{InMemoryLocalStore, LocalStore, StorageError};

pub const CART_KEY: &str = "cart";

/// Orders-collection wrapper with switchable failure points, used to drive
/// the checkout flow into its partial-failure states.
pub struct FlakyOrders {
    inner: Arc<InMemoryStore>,
    pub fail_create: AtomicBool,
    pub fail_apply_payment: AtomicBool,
}

impl FlakyOrders {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_apply_payment: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl OrderRepository for FlakyOrders {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected order create failure".to_string(),
            ));
        }
        OrderRepository::create(self.inner.as_ref(), order).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        OrderRepository::find_by_id(self.inner.as_ref(), id).await
    }

    async fn apply_payment(&self, id: Uuid, update: &OrderPaymentUpdate) -> Result<(), StoreError> {
        if self.fail_apply_payment.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected {
                collection: "orders",
                reason: "injected order update failure".to_string(),
            });
        }
        self.inner.apply_payment(id, update).await
    }
}

/// Local-store wrapper that can be made to fail writes, for exercising the
/// best-effort persistence contract.
pub struct FlakyLocalStore {
    inner: InMemoryLocalStore,
    pub fail_writes: AtomicBool,
}

impl FlakyLocalStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryLocalStore::new(),
            fail_writes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl LocalStore for FlakyLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected write failure",
            )));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected write failure",
            )));
        }
        self.inner.remove(key).await
    }
}

/// Test harness: services wired over an in-process store with a signed-in
/// shopper, and direct handles to everything for seeding and assertions.
pub struct TestApp {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub store: Arc<InMemoryStore>,
    pub orders: Arc<FlakyOrders>,
    pub local: Arc<InMemoryLocalStore>,
    pub identity: Arc<SessionIdentity>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_session_ttl(Duration::minutes(30)).await
    }

    pub async fn with_session_ttl(session_ttl: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let orders = Arc::new(FlakyOrders::new(store.clone()));
        let local = Arc::new(InMemoryLocalStore::new());
        let identity = Arc::new(SessionIdentity::signed_in(
            CustomerIdentity::new("shopper-1").with_email("shopper@example.com"),
        ));

        let cart = Arc::new(CartService::new(local.clone(), CART_KEY.to_string(), None));
        cart.initialize().await;

        let checkout = Arc::new(CheckoutService::new(
            cart.clone(),
            store.clone(),
            orders.clone(),
            store.clone(),
            store.clone(),
            identity.clone(),
            None,
            session_ttl,
        ));

        Self {
            cart,
            checkout,
            store,
            orders,
            local,
            identity,
        }
    }

    /// Seeds a purchasable catalog product plus its inventory record.
    pub fn seed_game(&self, id: &str, price: Decimal, stock: i64) {
        self.store
            .seed_product(&Product {
                id: id.to_string(),
                title: format!("Game {}", id),
                price,
                image: None,
                platform: Some("PC".to_string()),
                available: true,
                stock,
            })
            .unwrap();
        self.store
            .seed_inventory(&InventoryLevel::new(format!("inv-{}", id), id, stock))
            .unwrap();
    }

    /// Seeds a catalog product flagged unavailable.
    pub fn seed_unavailable_game(&self, id: &str, price: Decimal) {
        self.store
            .seed_product(&Product {
                id: id.to_string(),
                title: format!("Game {}", id),
                price,
                image: None,
                platform: Some("PC".to_string()),
                available: false,
                stock: 0,
            })
            .unwrap();
    }

    /// Seeds a catalog product without any inventory record.
    pub fn seed_game_without_inventory(&self, id: &str, price: Decimal) {
        self.store
            .seed_product(&Product {
                id: id.to_string(),
                title: format!("Game {}", id),
                price,
                image: None,
                platform: Some("PC".to_string()),
                available: true,
                stock: 0,
            })
            .unwrap();
    }

    pub async fn order(&self, id: Uuid) -> Order {
        OrderRepository::find_by_id(self.store.as_ref(), id)
            .await
            .unwrap()
            .expect("order document missing")
    }

    pub async fn payment(&self, id: Uuid) -> Option<Payment> {
        PaymentRepository::find_by_id(self.store.as_ref(), id)
            .await
            .unwrap()
    }

    pub async fn stock_for(&self, product_id: &str) -> i64 {
        let levels = self
            .store
            .find_by_products(&[product_id.to_string()])
            .await
            .unwrap();
        levels
            .first()
            .map(|level| level.stock_quantity)
            .expect("inventory record missing")
    }
}

pub fn add_input(id: &str, price: Decimal) -> AddToCartInput {
    AddToCartInput {
        id: id.to_string(),
        title: format!("Game {}", id),
        price,
        image: None,
        platform: Some("PC".to_string()),
    }
}

pub fn valid_card() -> PaymentInput {
    PaymentInput::CreditCard {
        number: "4242 4242 4242 4242".to_string(),
        expiry: "12/27".to_string(),
        cvv: "123".to_string(),
        cardholder: "Ada Lovelace".to_string(),
    }
}
