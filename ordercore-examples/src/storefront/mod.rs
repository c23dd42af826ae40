//! Storefront wiring: all services over one in-memory store.

use std::sync::Arc;

use rust_decimal_macros::dec;

use ordercore::catalog::VariantAttributes;
use ordercore::errors::CatalogResult;
use ordercore::types::{AttributeKey, Money, ProductName, Sku, StockQuantity};
use ordercore::{
    Catalog, CartStore, CheckoutOrchestrator, InventoryLedger, PricingPolicy, Product,
    ProductVariant,
};
use ordercore_memory::InMemoryCommerceStore;

/// One storefront: a shared store and every service wired over it.
pub struct Storefront {
    /// The shared backend.
    pub store: Arc<InMemoryCommerceStore>,
    /// Catalog admin surface.
    pub catalog: Catalog<InMemoryCommerceStore>,
    /// Stock ledger.
    pub ledger: InventoryLedger<InMemoryCommerceStore>,
    /// Cart service.
    pub carts: CartStore<InMemoryCommerceStore>,
    /// Checkout and order lifecycle service.
    pub checkout: CheckoutOrchestrator<InMemoryCommerceStore>,
}

impl Storefront {
    /// Creates a storefront with the default 10% pricing policy.
    pub fn new() -> Self {
        Self::with_pricing(PricingPolicy::default())
    }

    /// Creates a storefront with a custom pricing policy.
    pub fn with_pricing(pricing: PricingPolicy) -> Self {
        let store = Arc::new(InMemoryCommerceStore::new());
        Self {
            catalog: Catalog::new(Arc::clone(&store)),
            ledger: InventoryLedger::new(Arc::clone(&store)),
            carts: CartStore::new(Arc::clone(&store)),
            checkout: CheckoutOrchestrator::new(Arc::clone(&store), pricing),
            store,
        }
    }
}

impl Default for Storefront {
    fn default() -> Self {
        Self::new()
    }
}

/// A small seeded catalog the walkthrough and tests share.
pub struct SeededCatalog {
    /// The parent product.
    pub product: Product,
    /// Variant priced 100.00 with the given stock.
    pub hundred: ProductVariant,
    /// Variant priced 50.00 with the given stock.
    pub fifty: ProductVariant,
}

/// Seeds one product with two variants at 100.00 and 50.00.
pub async fn seed_catalog(
    shop: &Storefront,
    stock_each: u32,
) -> CatalogResult<SeededCatalog> {
    let product = shop
        .catalog
        .create_product(
            ProductName::try_new("Trail Runner").expect("valid name"),
            "All-terrain running shoe".to_string(),
        )
        .await?;

    let mut attributes = VariantAttributes::new();
    attributes.insert(
        AttributeKey::try_new("color").expect("valid key"),
        "blue".to_string(),
    );
    let hundred = shop
        .catalog
        .create_variant(
            product.id,
            Some(Sku::try_new("TRAIL-BLUE").expect("valid sku")),
            Money::new(dec!(100.00)).expect("valid price"),
            StockQuantity::new(stock_each),
            attributes,
        )
        .await?;

    let mut attributes = VariantAttributes::new();
    attributes.insert(
        AttributeKey::try_new("color").expect("valid key"),
        "red".to_string(),
    );
    let fifty = shop
        .catalog
        .create_variant(
            product.id,
            Some(Sku::try_new("TRAIL-RED").expect("valid sku")),
            Money::new(dec!(50.00)).expect("valid price"),
            StockQuantity::new(stock_each),
            attributes,
        )
        .await?;

    Ok(SeededCatalog {
        product,
        hundred,
        fifty,
    })
}
