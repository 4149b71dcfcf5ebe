pub mod commerce;

pub use commerce::{CartService, CheckoutService};
