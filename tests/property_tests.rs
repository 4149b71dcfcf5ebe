//! Property-based tests for the cart's core invariants.
//!
//! These use proptest to verify the invariants across a wide range of
//! inputs: hydration never panics and only yields valid items, persistence
//! round-trips are byte-identical, and repeated adds aggregate.

use std::sync::Arc;

use proptest::collection::vec;
use proptest::prelude::*;
use rust_decimal::Decimal;

use storefront_core::models::{hydrate_items, CartItem};
use storefront_core::services::commerce::{AddToCartInput, CartService};
use storefront_core::storage::InMemoryLocalStore;

fn product_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}".prop_map(|s| s)
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000, 0i64..100).prop_map(|(dollars, cents)| Decimal::new(dollars * 100 + cents, 2))
}

fn cart_item_strategy() -> impl Strategy<Value = CartItem> {
    (product_id_strategy(), price_strategy(), 1u32..50).prop_map(|(id, price, quantity)| CartItem {
        title: format!("Title for {}", id),
        id,
        price,
        image: None,
        platform: Some("PC".to_string()),
        quantity,
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("test runtime")
}

proptest! {
    // Hydration must never panic and must only yield invariant-satisfying
    // items, no matter what bytes were persisted.
    #[test]
    fn hydration_never_panics_and_filters_to_valid_items(raw in ".{0,256}") {
        let items = hydrate_items(&raw);
        for item in &items {
            prop_assert!(!item.id.trim().is_empty());
            prop_assert!(item.quantity >= 1);
            prop_assert!(!item.price.is_sign_negative());
        }
    }

    // A valid cart survives persist -> hydrate -> persist byte-identically.
    #[test]
    fn valid_carts_round_trip_byte_identical(items in vec(cart_item_strategy(), 0..8)) {
        let raw = serde_json::to_string(&items).unwrap();
        let hydrated = hydrate_items(&raw);
        prop_assert_eq!(&hydrated, &items);
        prop_assert_eq!(serde_json::to_string(&hydrated).unwrap(), raw);
    }

    // The cart total is always the sum of price x quantity over its lines.
    #[test]
    fn total_is_the_sum_of_line_subtotals(items in vec(cart_item_strategy(), 0..8)) {
        let expected: Decimal = items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();
        let summed: Decimal = items.iter().map(CartItem::subtotal).sum();
        prop_assert_eq!(summed, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // N adds of the same id always collapse into one line of quantity N.
    #[test]
    fn repeated_adds_aggregate_into_one_line(
        id in product_id_strategy(),
        price in price_strategy(),
        calls in 1u32..20,
    ) {
        runtime().block_on(async {
            let cart = CartService::new(
                Arc::new(InMemoryLocalStore::new()),
                "cart".to_string(),
                None,
            );
            cart.initialize().await;

            for _ in 0..calls {
                cart.add_item(AddToCartInput {
                    id: id.clone(),
                    title: "Title".to_string(),
                    price,
                    image: None,
                    platform: None,
                })
                .await
                .unwrap();
            }

            let items = cart.items().await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].quantity, calls);
            assert_eq!(
                cart.total().await.unwrap(),
                price * Decimal::from(calls)
            );
        });
    }

    // Interleaved valid and invalid mutations keep the cart consistent with
    // its persisted mirror.
    #[test]
    fn persisted_mirror_always_matches_memory(items in vec(cart_item_strategy(), 1..6)) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryLocalStore::new());
            let cart = CartService::new(store.clone(), "cart".to_string(), None);
            cart.initialize().await;

            for item in &items {
                cart.add_item(AddToCartInput {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    price: item.price,
                    image: item.image.clone(),
                    platform: item.platform.clone(),
                })
                .await
                .unwrap();
                let _ = cart.update_quantity(&item.id, 0).await; // always rejected
            }

            use storefront_core::storage::LocalStore;
            let raw = store.get("cart").await.unwrap().unwrap();
            assert_eq!(hydrate_items(&raw), cart.items().await.unwrap());
        });
    }
}
