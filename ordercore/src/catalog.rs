//! Catalog entities and the admin surface that maintains them.
//!
//! Products and their variants are created and edited here; the cart and
//! checkout services only ever read or lease them. Deactivating a product
//! hides it from listings but never cascades into variants already
//! referenced by orders.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{CatalogError, CatalogResult};
use crate::store::{CommerceStore, VariantLease};
use crate::types::{
    AttributeKey, Money, ProductId, ProductName, Sku, StockQuantity, Timestamp, VariantId,
};

/// Ordered key/value attributes of a variant; keys are unique by
/// construction of the map.
pub type VariantAttributes = BTreeMap<AttributeKey, String>;

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: ProductName,
    /// Free-text description.
    pub description: String,
    /// Inactive products are hidden from listings.
    pub active: bool,
    /// When the product was created.
    pub created_at: Timestamp,
    /// When the product was last modified.
    pub updated_at: Timestamp,
}

impl Product {
    /// Creates an active product.
    pub fn new(name: ProductName, description: String) -> Self {
        let now = Timestamp::now();
        Self {
            id: ProductId::new(),
            name,
            description,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A purchasable variant of a product, with its own price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Unique variant identifier.
    pub id: VariantId,
    /// The product this variant belongs to.
    pub product_id: ProductId,
    /// Optional SKU, unique across all variants when present.
    pub sku: Option<Sku>,
    /// Unit price.
    pub price: Money,
    /// Units on hand. Mutated only through the inventory ledger.
    pub stock: StockQuantity,
    /// Inactive variants cannot be added to carts or checked out.
    pub active: bool,
    /// Ordered key/value attributes (e.g. size, color).
    pub attributes: VariantAttributes,
    /// When the variant was created.
    pub created_at: Timestamp,
    /// When the variant was last modified.
    pub updated_at: Timestamp,
}

impl ProductVariant {
    /// Creates an active variant for a product.
    pub fn new(
        product_id: ProductId,
        sku: Option<Sku>,
        price: Money,
        stock: StockQuantity,
        attributes: VariantAttributes,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: VariantId::new(),
            product_id,
            sku,
            price,
            stock,
            active: true,
            attributes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any units are on hand.
    pub const fn in_stock(&self) -> bool {
        self.stock.value() > 0
    }
}

/// Admin surface for maintaining products and variants.
///
/// Variant edits take the variant's row lease first so they serialize with
/// concurrent checkouts touching the same row.
pub struct Catalog<S> {
    store: Arc<S>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CommerceStore> Catalog<S> {
    /// Creates a catalog over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates and persists a product.
    #[instrument(skip(self, description))]
    pub async fn create_product(
        &self,
        name: ProductName,
        description: String,
    ) -> CatalogResult<Product> {
        let product = Product::new(name, description);
        self.store.insert_product(product.clone()).await?;
        debug!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Activates or deactivates a product. Variants are untouched.
    #[instrument(skip(self))]
    pub async fn set_product_active(
        &self,
        product_id: ProductId,
        active: bool,
    ) -> CatalogResult<Product> {
        let mut product = self
            .store
            .product(&product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))?;
        product.active = active;
        product.updated_at = Timestamp::now();
        if !self.store.update_product(product.clone()).await? {
            return Err(CatalogError::ProductNotFound(product_id));
        }
        Ok(product)
    }

    /// Lists products, hiding inactive ones unless asked.
    pub async fn products(&self, include_inactive: bool) -> CatalogResult<Vec<Product>> {
        let mut products = self.store.products().await?;
        if !include_inactive {
            products.retain(|p| p.active);
        }
        Ok(products)
    }

    /// Fetches one product. Inactive products are only visible with
    /// `include_inactive`.
    pub async fn product(
        &self,
        product_id: &ProductId,
        include_inactive: bool,
    ) -> CatalogResult<Product> {
        match self.store.product(product_id).await? {
            Some(product) if product.active || include_inactive => Ok(product),
            _ => Err(CatalogError::ProductNotFound(*product_id)),
        }
    }

    /// Creates and persists a variant of an existing product.
    #[instrument(skip(self, attributes))]
    pub async fn create_variant(
        &self,
        product_id: ProductId,
        sku: Option<Sku>,
        price: Money,
        stock: StockQuantity,
        attributes: VariantAttributes,
    ) -> CatalogResult<ProductVariant> {
        if self.store.product(&product_id).await?.is_none() {
            return Err(CatalogError::ProductNotFound(product_id));
        }
        let variant = ProductVariant::new(product_id, sku, price, stock, attributes);
        self.store.insert_variant(variant.clone()).await?;
        debug!(variant_id = %variant.id, %product_id, "variant created");
        Ok(variant)
    }

    /// Changes a variant's unit price. Placed orders keep their snapshots.
    #[instrument(skip(self))]
    pub async fn set_variant_price(
        &self,
        variant_id: VariantId,
        price: Money,
    ) -> CatalogResult<ProductVariant> {
        self.edit_variant(variant_id, |variant| variant.price = price)
            .await
    }

    /// Activates or deactivates a variant.
    #[instrument(skip(self))]
    pub async fn set_variant_active(
        &self,
        variant_id: VariantId,
        active: bool,
    ) -> CatalogResult<ProductVariant> {
        self.edit_variant(variant_id, |variant| variant.active = active)
            .await
    }

    /// Replaces a variant's attribute map wholesale.
    #[instrument(skip(self, attributes))]
    pub async fn replace_variant_attributes(
        &self,
        variant_id: VariantId,
        attributes: VariantAttributes,
    ) -> CatalogResult<ProductVariant> {
        self.edit_variant(variant_id, |variant| variant.attributes = attributes)
            .await
    }

    /// All variants of a product, cheapest first.
    pub async fn variants_for_product(
        &self,
        product_id: &ProductId,
    ) -> CatalogResult<Vec<ProductVariant>> {
        Ok(self.store.variants_for_product(product_id).await?)
    }

    /// Read-modify-write of one variant under its row lease.
    async fn edit_variant(
        &self,
        variant_id: VariantId,
        apply: impl FnOnce(&mut ProductVariant),
    ) -> CatalogResult<ProductVariant> {
        let lease = self.store.lock_variants(&[variant_id]).await?;
        let mut variant = lease
            .variant(&variant_id)
            .cloned()
            .ok_or(CatalogError::VariantNotFound(variant_id))?;
        apply(&mut variant);
        variant.updated_at = Timestamp::now();
        if !self.store.update_variant(variant.clone()).await? {
            return Err(CatalogError::VariantNotFound(variant_id));
        }
        Ok(variant)
    }
}
