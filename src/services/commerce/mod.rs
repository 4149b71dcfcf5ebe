//! Commerce services: the cart state manager and the checkout flow.

pub mod cart_service;
pub mod checkout_service;

pub use cart_service::{AddToCartInput, CartService};
pub use checkout_service::{
    CheckoutReceipt, CheckoutService, CheckoutSession, CheckoutStep, PaymentInput,
    ReconciliationWarning, UnavailableItem,
};
