// Core documents
pub mod cart;
pub mod catalog;
pub mod inventory;
pub mod order;
pub mod payment;

pub use cart::{hydrate_items, CartItem};
pub use catalog::Product;
pub use inventory::InventoryLevel;
pub use order::{CheckoutLine, CheckoutPayload, Order, OrderPaymentUpdate, OrderStatus, PaymentStatus};
pub use payment::{Payment, PaymentDetails, PaymentMethod};
