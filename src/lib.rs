//! Storefront core library
//!
//! This crate provides the cart state manager and the multi-step checkout
//! flow of a storefront application. Persistence, authentication, and
//! querying are delegated to external collaborators reached through narrow,
//! constructor-injected traits: a local key-value store for the cart mirror,
//! four document-collection repositories (catalog, orders, payments,
//! inventory), and an identity provider. In-process implementations of every
//! boundary ship with the crate so the storefront runs before a real backend
//! exists.
//!
//! [`Storefront`] is the composition root: it wires the event channel,
//! constructs the services, and hydrates the cart.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod repositories;
pub mod services;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use auth::{CustomerIdentity, IdentityProvider, SessionIdentity};
pub use config::{init_tracing, load_config, StorefrontConfig};
pub use errors::ServiceError;
pub use events::{Event, EventSender};
pub use services::commerce::{
    AddToCartInput, CartService, CheckoutReceipt, CheckoutService, CheckoutSession, CheckoutStep,
    PaymentInput,
};

use repositories::{
    CatalogRepository, InMemoryStore, InventoryRepository, OrderRepository, PaymentRepository,
};
use storage::{InMemoryLocalStore, LocalStore};

/// The injected collaborator set a [`Storefront`] is built from.
pub struct StorefrontBackends {
    pub local_store: Arc<dyn LocalStore>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl StorefrontBackends {
    /// Backends served entirely in process: an [`InMemoryStore`] for every
    /// remote collection and an [`InMemoryLocalStore`] for the cart mirror.
    /// Returns the store alongside so callers can seed catalog and inventory
    /// documents.
    pub fn in_process(identity: Arc<dyn IdentityProvider>) -> (Self, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let backends = Self {
            local_store: Arc::new(InMemoryLocalStore::new()),
            catalog: store.clone(),
            orders: store.clone(),
            payments: store.clone(),
            inventory: store.clone(),
            identity,
        };
        (backends, store)
    }
}

/// Composition root owning the services and the event processor lifecycle.
pub struct Storefront {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    event_sender: Arc<EventSender>,
    event_task: JoinHandle<()>,
}

impl Storefront {
    /// Wires the event channel, builds the services around the injected
    /// backends, and hydrates the cart from the local store.
    pub async fn init(config: StorefrontConfig, backends: StorefrontBackends) -> Self {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let event_sender = Arc::new(EventSender::new(tx));
        let event_task = tokio::spawn(events::process_events(rx));

        let cart = Arc::new(CartService::new(
            backends.local_store,
            config.cart_storage_key.clone(),
            Some(event_sender.clone()),
        ));
        cart.initialize().await;

        let checkout = Arc::new(CheckoutService::new(
            cart.clone(),
            backends.catalog,
            backends.orders,
            backends.payments,
            backends.inventory,
            backends.identity,
            Some(event_sender.clone()),
            config.checkout_session_ttl(),
        ));

        info!(environment = %config.environment, "storefront initialized");
        Self {
            cart,
            checkout,
            event_sender,
            event_task,
        }
    }

    /// Handle for emitting events from outside the services.
    pub fn events(&self) -> Arc<EventSender> {
        self.event_sender.clone()
    }

    /// Drops the services and drains the event processor.
    pub async fn shutdown(self) {
        let Self {
            cart,
            checkout,
            event_sender,
            mut event_task,
        } = self;

        // The processor's channel closes once every sender is gone.
        drop(checkout);
        drop(cart);
        drop(event_sender);

        if tokio::time::timeout(Duration::from_secs(5), &mut event_task)
            .await
            .is_err()
        {
            warn!("event processor did not drain in time; aborting it");
            event_task.abort();
        }
    }
}
