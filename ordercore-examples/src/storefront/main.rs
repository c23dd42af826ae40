//! Runnable storefront walkthrough.
//!
//! Seeds a catalog, fills a cart, checks out, and cancels a second order,
//! logging each step. Run with:
//!
//! ```text
//! cargo run --example storefront
//! ```

use anyhow::Result;
use tracing::info;

use ordercore::types::{Quantity, UserId};
use ordercore::OrderStatus;
use ordercore_examples::storefront::{seed_catalog, Storefront};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let shop = Storefront::new();
    let seeded = seed_catalog(&shop, 10).await?;
    info!(product = %seeded.product.name, "catalog seeded");

    let alice = UserId::try_new("alice")?;

    // Fill the cart: 2 × 100.00 and 1 × 50.00.
    let two = Quantity::new(2)?;
    let one = Quantity::new(1)?;
    shop.carts
        .add_item(&alice, &seeded.hundred.id, two, "gift wrap please")
        .await?;
    shop.carts.add_item(&alice, &seeded.fifty.id, one, "").await?;

    let view = shop.carts.view(&alice).await?;
    info!(
        lines = view.item_count(),
        subtotal = %view.subtotal()?,
        "cart ready"
    );

    // Checkout snapshots prices, takes stock, and clears the cart.
    let detail = shop.checkout.checkout(&alice).await?;
    info!(
        order = %detail.order.id,
        subtotal = %detail.order.subtotal,
        tax = %detail.order.tax,
        total = %detail.order.total,
        "order placed"
    );

    let remaining = shop.ledger.variant(&seeded.hundred.id).await?;
    info!(variant = %remaining.id, stock = %remaining.stock, "stock after checkout");

    // A second order, confirmed and then cancelled: stock comes back.
    shop.carts
        .add_item(&alice, &seeded.hundred.id, one, "")
        .await?;
    let second = shop.checkout.checkout(&alice).await?;
    shop.checkout
        .advance_order(&alice, &second.order.id, OrderStatus::Confirmed)
        .await?;
    let cancelled = shop.checkout.cancel_order(&alice, &second.order.id).await?;
    info!(
        order = %cancelled.order.id,
        status = %cancelled.order.status,
        "second order cancelled"
    );

    let restored = shop.ledger.variant(&seeded.hundred.id).await?;
    info!(variant = %restored.id, stock = %restored.stock, "stock after cancellation");

    let orders = shop.checkout.orders(&alice).await?;
    info!(count = orders.len(), "orders on file");

    Ok(())
}
