//! End-to-end tests for the storefront flows: cart mutation, checkout
//! atomicity, oversell prevention under concurrency, and the order
//! lifecycle.

use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::sync::Barrier;

use ordercore::errors::{CartError, CheckoutError, InventoryError, OrderError};
use ordercore::types::{CartItemId, Money, OrderId, Quantity, UserId};
use ordercore::OrderStatus;
use ordercore_examples::storefront::{seed_catalog, SeededCatalog, Storefront};

fn user(name: &str) -> UserId {
    UserId::try_new(name).unwrap()
}

fn qty(n: u32) -> Quantity {
    Quantity::new(n).unwrap()
}

async fn shop_with_stock(stock_each: u32) -> (Storefront, SeededCatalog) {
    let shop = Storefront::new();
    let seeded = seed_catalog(&shop, stock_each).await.unwrap();
    (shop, seeded)
}

// --- cart mutation -------------------------------------------------------

#[tokio::test]
async fn adding_same_variant_twice_folds_into_one_line() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    let (_, created) = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap();
    assert!(created);

    let (folded, created) = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(3), "")
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(folded.quantity.value(), 5);

    let view = shop.carts.view(&alice).await.unwrap();
    assert_eq!(view.item_count(), 1);
    assert_eq!(view.lines[0].item.quantity.value(), 5);
}

#[tokio::test]
async fn folding_validates_the_new_total_against_stock() {
    let (shop, seeded) = shop_with_stock(3).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap();
    let err = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CartError::Inventory(InventoryError::OutOfStock { .. })
    ));

    // The failed fold left the line unchanged.
    let view = shop.carts.view(&alice).await.unwrap();
    assert_eq!(view.lines[0].item.quantity.value(), 2);
}

#[tokio::test]
async fn empty_note_does_not_overwrite_an_existing_one() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "gift wrap")
        .await
        .unwrap();
    let (item, _) = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();
    assert_eq!(item.note, "gift wrap");

    let (item, _) = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "no wrap after all")
        .await
        .unwrap();
    assert_eq!(item.note, "no wrap after all");
}

#[tokio::test]
async fn update_item_revalidates_stock_and_leaves_line_unchanged_on_failure() {
    let (shop, seeded) = shop_with_stock(3).await;
    let alice = user("alice");

    let (item, _) = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();

    // Zero and negative quantities are unrepresentable: rejected at
    // construction before the service is ever reached.
    assert!(Quantity::new(0).is_err());

    let err = shop
        .carts
        .update_item(&alice, &item.id, Some(qty(5)), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CartError::Inventory(InventoryError::OutOfStock { .. })
    ));
    let view = shop.carts.view(&alice).await.unwrap();
    assert_eq!(view.lines[0].item.quantity.value(), 1);

    let updated = shop
        .carts
        .update_item(&alice, &item.id, Some(qty(3)), None)
        .await
        .unwrap();
    assert_eq!(updated.quantity.value(), 3);

    // A note update alone touches nothing else, and an explicit empty note
    // replaces the stored one.
    let updated = shop
        .carts
        .update_item(&alice, &item.id, None, Some(String::new()))
        .await
        .unwrap();
    assert_eq!(updated.quantity.value(), 3);
    assert_eq!(updated.note, "");
}

#[tokio::test]
async fn missing_items_surface_item_not_found() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");
    let ghost = CartItemId::new();

    let err = shop
        .carts
        .update_item(&alice, &ghost, Some(qty(1)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::ItemNotFound(_)));

    let err = shop.carts.remove_item(&alice, &ghost).await.unwrap_err();
    assert!(matches!(err, CartError::ItemNotFound(_)));

    // Items in another user's cart are invisible here.
    let (bob_item, _) = shop
        .carts
        .add_item(&user("bob"), &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();
    let err = shop
        .carts
        .remove_item(&alice, &bob_item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::ItemNotFound(_)));
}

#[tokio::test]
async fn remove_and_clear_manage_lines() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    let (item, _) = shop
        .carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();
    shop.carts
        .add_item(&alice, &seeded.fifty.id, qty(1), "")
        .await
        .unwrap();

    shop.carts.remove_item(&alice, &item.id).await.unwrap();
    assert_eq!(shop.carts.view(&alice).await.unwrap().item_count(), 1);

    shop.carts.clear(&alice).await.unwrap();
    assert_eq!(shop.carts.view(&alice).await.unwrap().item_count(), 0);

    // Clearing an already-empty cart is a no-op.
    shop.carts.clear(&alice).await.unwrap();
}

#[tokio::test]
async fn cart_lines_reflect_live_prices_until_checkout() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap();
    shop.catalog
        .set_variant_price(seeded.hundred.id, Money::new(dec!(80.00)).unwrap())
        .await
        .unwrap();

    let view = shop.carts.view(&alice).await.unwrap();
    assert_eq!(view.subtotal().unwrap().amount(), dec!(160.00));
}

#[tokio::test]
async fn concurrent_adds_from_one_user_serialize_instead_of_losing_updates() {
    let (shop, seeded) = shop_with_stock(10).await;
    let shop = Arc::new(shop);
    let alice = user("alice");

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let shop = Arc::clone(&shop);
        let barrier = Arc::clone(&barrier);
        let alice = alice.clone();
        let variant_id = seeded.hundred.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            shop.carts
                .add_item(&alice, &variant_id, qty(1), "")
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let view = shop.carts.view(&alice).await.unwrap();
    assert_eq!(view.item_count(), 1);
    assert_eq!(view.lines[0].item.quantity.value(), 4);
}

// --- checkout ------------------------------------------------------------

#[tokio::test]
async fn checkout_produces_the_reference_totals() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap();
    shop.carts
        .add_item(&alice, &seeded.fifty.id, qty(1), "fragile")
        .await
        .unwrap();

    let detail = shop.checkout.checkout(&alice).await.unwrap();
    assert_eq!(detail.order.subtotal.amount(), dec!(250.00));
    assert_eq!(detail.order.tax.amount(), dec!(25.00));
    assert_eq!(detail.order.total.amount(), dec!(275.00));
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.items.len(), 2);

    // The order is internally consistent.
    assert_eq!(detail.items_total().unwrap(), detail.order.subtotal);
    assert_eq!(
        detail.order.subtotal.checked_add(detail.order.tax).unwrap(),
        detail.order.total
    );

    // Stock was taken and the cart is empty again.
    let hundred = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    let fifty = shop.ledger.variant(&seeded.fifty.id).await.unwrap();
    assert_eq!(hundred.stock.value(), 8);
    assert_eq!(fifty.stock.value(), 9);
    assert_eq!(shop.carts.view(&alice).await.unwrap().item_count(), 0);

    // The note rode along onto the snapshot.
    let fragile = detail
        .items
        .iter()
        .find(|item| item.variant_id == seeded.fifty.id)
        .unwrap();
    assert_eq!(fragile.note, "fragile");
}

#[tokio::test]
async fn order_snapshots_are_immune_to_later_price_changes() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();
    let detail = shop.checkout.checkout(&alice).await.unwrap();

    shop.catalog
        .set_variant_price(seeded.hundred.id, Money::new(dec!(999.99)).unwrap())
        .await
        .unwrap();

    let reread = shop
        .checkout
        .order(&alice, &detail.order.id)
        .await
        .unwrap();
    assert_eq!(reread.order.subtotal.amount(), dec!(100.00));
    assert_eq!(reread.items[0].price_at_purchase.amount(), dec!(100.00));
    assert_eq!(reread.items[0].line_total().unwrap().amount(), dec!(100.00));
}

#[tokio::test]
async fn checkout_of_an_empty_cart_fails_and_persists_nothing() {
    let (shop, _) = shop_with_stock(10).await;
    let alice = user("alice");

    // No cart at all yet.
    let err = shop.checkout.checkout(&alice).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    // An existing but empty cart behaves the same.
    shop.carts.get_or_create_cart(&alice).await.unwrap();
    let err = shop.checkout.checkout(&alice).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    assert!(shop.checkout.orders(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn one_failing_line_aborts_the_whole_checkout() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap();
    shop.carts
        .add_item(&alice, &seeded.fifty.id, qty(1), "")
        .await
        .unwrap();

    // The second variant is deactivated between add and checkout.
    shop.catalog
        .set_variant_active(seeded.fifty.id, false)
        .await
        .unwrap();

    let err = shop.checkout.checkout(&alice).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Inventory(InventoryError::VariantInactive(_))
    ));

    // No partial order: nothing persisted, no stock taken, cart intact.
    assert!(shop.checkout.orders(&alice).await.unwrap().is_empty());
    let hundred = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    assert_eq!(hundred.stock.value(), 10);
    assert_eq!(shop.carts.view(&alice).await.unwrap().item_count(), 2);
}

#[tokio::test]
async fn checkout_revalidates_stock_that_moved_after_the_add() {
    let (shop, seeded) = shop_with_stock(3).await;
    let alice = user("alice");

    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(2), "")
        .await
        .unwrap();

    // A warehouse correction takes stock down to 1 before checkout.
    shop.ledger
        .decrease_stock(&seeded.hundred.id, qty(2))
        .await
        .unwrap();

    let err = shop.checkout.checkout(&alice).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Inventory(InventoryError::OutOfStock { .. })
    ));
    assert!(shop.checkout.orders(&alice).await.unwrap().is_empty());
    assert_eq!(shop.carts.view(&alice).await.unwrap().item_count(), 1);
}

#[tokio::test]
async fn concurrent_checkouts_cannot_oversell_a_variant() {
    let (shop, seeded) = shop_with_stock(3).await;
    let shop = Arc::new(shop);

    // Both users stage 2 units of a 3-unit variant; both adds validate.
    let users = [user("alice"), user("bob")];
    for u in &users {
        shop.carts
            .add_item(u, &seeded.hundred.id, qty(2), "")
            .await
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(users.len()));
    let mut handles = Vec::new();
    for u in users.clone() {
        let shop = Arc::clone(&shop);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            shop.checkout.checkout(&u).await
        }));
    }

    let mut successes = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CheckoutError::Inventory(InventoryError::OutOfStock { .. })) => {
                out_of_stock += 1;
            }
            Err(other) => panic!("unexpected checkout failure: {other:?}"),
        }
    }

    // Stock could satisfy one order but not both.
    assert_eq!(successes, 1);
    assert_eq!(out_of_stock, 1);
    let remaining = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    assert_eq!(remaining.stock.value(), 1);
}

#[tokio::test]
async fn concurrent_decrements_never_exceed_initial_stock() {
    let initial_stock = 5u32;
    let (shop, seeded) = shop_with_stock(initial_stock).await;
    let shop = Arc::new(shop);

    // Eight shoppers race for 5 units, two apiece.
    let shoppers: Vec<UserId> = (0..8).map(|i| user(&format!("shopper-{i}"))).collect();
    for u in &shoppers {
        shop.carts
            .add_item(u, &seeded.hundred.id, qty(2), "")
            .await
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(shoppers.len()));
    let mut handles = Vec::new();
    for u in shoppers.clone() {
        let shop = Arc::clone(&shop);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            shop.checkout.checkout(&u).await.is_ok()
        }));
    }
    let mut successes = 0u32;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    let remaining = shop
        .ledger
        .variant(&seeded.hundred.id)
        .await
        .unwrap()
        .stock
        .value();
    // Every successful checkout took exactly 2 units, and the books balance.
    assert_eq!(remaining, initial_stock - successes * 2);
    assert!(successes * 2 <= initial_stock);
    assert_eq!(successes, 2);
}

#[tokio::test]
async fn checkouts_over_disjoint_variants_proceed_independently() {
    let (shop, seeded) = shop_with_stock(5).await;
    let shop = Arc::new(shop);

    let alice = user("alice");
    let bob = user("bob");
    shop.carts
        .add_item(&alice, &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();
    shop.carts
        .add_item(&bob, &seeded.fifty.id, qty(1), "")
        .await
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for u in [alice, bob] {
        let shop = Arc::clone(&shop);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            shop.checkout.checkout(&u).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}

// --- order lifecycle -----------------------------------------------------

async fn place_order(shop: &Storefront, seeded: &SeededCatalog, who: &UserId) -> OrderId {
    shop.carts
        .add_item(who, &seeded.hundred.id, qty(1), "")
        .await
        .unwrap();
    shop.checkout.checkout(who).await.unwrap().order.id
}

#[tokio::test]
async fn cancellation_restocks_and_is_not_repeatable() {
    let (shop, seeded) = shop_with_stock(5).await;
    let alice = user("alice");
    let order_id = place_order(&shop, &seeded, &alice).await;

    let before = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    assert_eq!(before.stock.value(), 4);

    let cancelled = shop.checkout.cancel_order(&alice, &order_id).await.unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    let after = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    assert_eq!(after.stock.value(), 5);

    let err = shop
        .checkout
        .cancel_order(&alice, &order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition { .. }));
    // Stock is returned exactly once.
    let after = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    assert_eq!(after.stock.value(), 5);
}

#[tokio::test]
async fn orders_walk_the_lifecycle_one_step_at_a_time() {
    let (shop, seeded) = shop_with_stock(5).await;
    let alice = user("alice");
    let order_id = place_order(&shop, &seeded, &alice).await;

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let detail = shop
            .checkout
            .advance_order(&alice, &order_id, status)
            .await
            .unwrap();
        assert_eq!(detail.order.status, status);
    }

    // Terminal orders cannot move, and skipping steps is rejected.
    let err = shop
        .checkout
        .advance_order(&alice, &order_id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition { .. }));

    let second = place_order(&shop, &seeded, &alice).await;
    let err = shop
        .checkout
        .advance_order(&alice, &second, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn cancellation_after_fulfilment_starts_is_rejected() {
    let (shop, seeded) = shop_with_stock(5).await;
    let alice = user("alice");
    let order_id = place_order(&shop, &seeded, &alice).await;

    shop.checkout
        .advance_order(&alice, &order_id, OrderStatus::Confirmed)
        .await
        .unwrap();
    shop.checkout
        .advance_order(&alice, &order_id, OrderStatus::Processing)
        .await
        .unwrap();

    let err = shop
        .checkout
        .cancel_order(&alice, &order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidStatusTransition { .. }));
    // No stock came back.
    let stock = shop.ledger.variant(&seeded.hundred.id).await.unwrap();
    assert_eq!(stock.stock.value(), 4);
}

#[tokio::test]
async fn orders_are_listed_newest_first_and_scoped_per_user() {
    let (shop, seeded) = shop_with_stock(10).await;
    let alice = user("alice");
    let bob = user("bob");

    let first = place_order(&shop, &seeded, &alice).await;
    let second = place_order(&shop, &seeded, &alice).await;
    let bobs = place_order(&shop, &seeded, &bob).await;

    let listed = shop.checkout.orders(&alice).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second);
    assert_eq!(listed[1].id, first);

    // Cross-user access is a NotFound, not a leak.
    let err = shop.checkout.order(&alice, &bobs).await.unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
    assert!(shop.checkout.order(&bob, &bobs).await.is_ok());
}
