use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Storefront lifecycle events, emitted by the services on completed
/// operations and consumed by [`process_events`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        product_id: String,
        quantity: u32,
    },
    CartItemRemoved {
        product_id: String,
    },
    CartQuantityChanged {
        product_id: String,
        quantity: u32,
    },
    CartCleared,

    // Checkout events
    CheckoutStarted {
        session_id: Uuid,
        item_count: u32,
    },
    CheckoutCompleted {
        session_id: Uuid,
        order_id: Uuid,
    },
    CheckoutFailed {
        session_id: Uuid,
        step: String,
        reason: String,
    },
    CheckoutCancelled {
        session_id: Uuid,
    },

    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentCaptured {
        payment_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },

    // Inventory events
    InventoryAdjusted {
        product_id: String,
        old_quantity: i64,
        new_quantity: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, downgrading delivery failure to a warning.
    ///
    /// Used on success paths: a completed domain operation must not turn
    /// into an error because the channel is full or its consumer is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, event = ?event, "event delivery failed");
        }
    }
}

// Consumes incoming events. Everything is logged; degraded states get
// warnings so operators can spot them without a metrics pipeline.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CheckoutFailed {
                session_id,
                step,
                reason,
            } => {
                warn!(%session_id, step = %step, reason = %reason, "checkout failed");
            }
            Event::InventoryAdjusted {
                product_id,
                old_quantity,
                new_quantity,
            } if *new_quantity < 0 => {
                warn!(
                    product_id = %product_id,
                    old_quantity,
                    new_quantity,
                    "inventory stock went negative"
                );
            }
            other => {
                info!(event = ?other, "event received");
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}
