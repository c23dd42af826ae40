//! In-memory storage backend for `OrderCore`.
//!
//! This crate provides an in-memory implementation of the `CommerceStore`
//! trait from the ordercore crate, useful for testing and development
//! scenarios where persistence is not required.
//!
//! Row leases are real locks: each variant row and each user's cart has an
//! async mutex in a lock registry, acquired in ascending id order and held
//! until the lease drops. The checkout commit validates every stock
//! condition under the table write guard before applying anything, so a
//! failed checkout leaves no trace.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::debug;

use ordercore::errors::{StoreError, StoreResult};
use ordercore::store::{CheckoutBatch, CommerceStore, VariantLease};
use ordercore::types::{
    CartId, CartItemId, OrderId, ProductId, Quantity, Timestamp, UserId, VariantId,
};
use ordercore::{Cart, CartItem, Order, OrderItem, OrderStatus, Product, ProductVariant};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    variants: HashMap<VariantId, ProductVariant>,
    // One cart per user; the key is the uniqueness constraint.
    carts: HashMap<UserId, Cart>,
    cart_items: HashMap<CartId, Vec<CartItem>>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
}

type LockRegistry<K> = Arc<Mutex<HashMap<K, Arc<RowMutex<()>>>>>;

/// Thread-safe in-memory commerce store for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryCommerceStore {
    tables: Arc<RwLock<Tables>>,
    variant_locks: LockRegistry<VariantId>,
    cart_locks: LockRegistry<UserId>,
}

impl InMemoryCommerceStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn variant_lock(&self, id: VariantId) -> Arc<RowMutex<()>> {
        let mut registry = self.variant_locks.lock().expect("Mutex poisoned");
        Arc::clone(registry.entry(id).or_default())
    }

    fn cart_lock(&self, user: &UserId) -> Arc<RowMutex<()>> {
        let mut registry = self.cart_locks.lock().expect("Mutex poisoned");
        Arc::clone(registry.entry(user.clone()).or_default())
    }
}

/// Exclusive hold on a set of variant rows, with a snapshot taken under
/// the locks. Dropping the lease releases the rows.
pub struct InMemoryVariantLease {
    ids: Vec<VariantId>,
    rows: HashMap<VariantId, ProductVariant>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl VariantLease for InMemoryVariantLease {
    fn variant(&self, id: &VariantId) -> Option<&ProductVariant> {
        self.rows.get(id)
    }

    fn ids(&self) -> &[VariantId] {
        &self.ids
    }
}

/// Exclusive hold on one user's cart. Dropping the lease releases it.
pub struct InMemoryCartLease {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl CommerceStore for InMemoryCommerceStore {
    type VariantLease = InMemoryVariantLease;
    type CartLease = InMemoryCartLease;

    async fn insert_product(&self, product: Product) -> StoreResult<()> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Conflict {
                entity: "product",
                detail: format!("product {} already exists", product.id),
            });
        }
        tables.products.insert(product.id, product);
        Ok(())
    }

    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        Ok(tables.products.get(id).cloned())
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }

    async fn update_product(&self, product: Product) -> StoreResult<bool> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        if !tables.products.contains_key(&product.id) {
            return Ok(false);
        }
        tables.products.insert(product.id, product);
        Ok(true)
    }

    async fn insert_variant(&self, variant: ProductVariant) -> StoreResult<()> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        if tables.variants.contains_key(&variant.id) {
            return Err(StoreError::Conflict {
                entity: "variant",
                detail: format!("variant {} already exists", variant.id),
            });
        }
        if let Some(sku) = &variant.sku {
            if tables.variants.values().any(|v| v.sku.as_ref() == Some(sku)) {
                return Err(StoreError::Conflict {
                    entity: "variant",
                    detail: format!("sku '{sku}' already exists"),
                });
            }
        }
        tables.variants.insert(variant.id, variant);
        Ok(())
    }

    async fn variant(&self, id: &VariantId) -> StoreResult<Option<ProductVariant>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        Ok(tables.variants.get(id).cloned())
    }

    async fn variants_for_product(
        &self,
        product_id: &ProductId,
    ) -> StoreResult<Vec<ProductVariant>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        let mut variants: Vec<ProductVariant> = tables
            .variants
            .values()
            .filter(|v| v.product_id == *product_id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
        Ok(variants)
    }

    async fn update_variant(&self, variant: ProductVariant) -> StoreResult<bool> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        if !tables.variants.contains_key(&variant.id) {
            return Ok(false);
        }
        if let Some(sku) = &variant.sku {
            if tables
                .variants
                .values()
                .any(|v| v.id != variant.id && v.sku.as_ref() == Some(sku))
            {
                return Err(StoreError::Conflict {
                    entity: "variant",
                    detail: format!("sku '{sku}' already exists"),
                });
            }
        }
        tables.variants.insert(variant.id, variant);
        Ok(true)
    }

    async fn lock_variants(&self, ids: &[VariantId]) -> StoreResult<Self::VariantLease> {
        let mut ordered: Vec<VariantId> = ids.to_vec();
        ordered.sort_unstable(); // ascending ids keep overlapping acquisitions deadlock-free
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in &ordered {
            let lock = self.variant_lock(*id);
            guards.push(lock.lock_owned().await);
        }

        let tables = self.tables.read().expect("RwLock poisoned");
        let rows: HashMap<VariantId, ProductVariant> = ordered
            .iter()
            .filter_map(|id| tables.variants.get(id).map(|v| (*id, v.clone())))
            .collect();
        drop(tables);

        debug!(locked = ordered.len(), "variant lease acquired");
        Ok(InMemoryVariantLease {
            ids: ordered,
            rows,
            _guards: guards,
        })
    }

    async fn decrease_stock(&self, id: &VariantId, quantity: Quantity) -> StoreResult<bool> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        let Some(variant) = tables.variants.get_mut(id) else {
            return Ok(false);
        };
        match variant.stock.take(quantity) {
            Some(remaining) => {
                variant.stock = remaining;
                variant.updated_at = Timestamp::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increase_stock(&self, id: &VariantId, quantity: Quantity) -> StoreResult<()> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        if let Some(variant) = tables.variants.get_mut(id) {
            variant.stock = variant.stock.put_back(quantity);
            variant.updated_at = Timestamp::now();
        }
        Ok(())
    }

    async fn lock_cart(&self, user: &UserId) -> StoreResult<Self::CartLease> {
        let lock = self.cart_lock(user);
        let guard = lock.lock_owned().await;
        Ok(InMemoryCartLease { _guard: guard })
    }

    async fn get_or_create_cart(&self, user: &UserId) -> StoreResult<Cart> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        if let Some(cart) = tables.carts.get(user) {
            return Ok(cart.clone());
        }
        let cart = Cart::new(user.clone());
        tables.carts.insert(user.clone(), cart.clone());
        tables.cart_items.insert(cart.id, Vec::new());
        Ok(cart)
    }

    async fn cart(&self, user: &UserId) -> StoreResult<Option<Cart>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        Ok(tables.carts.get(user).cloned())
    }

    async fn cart_items(&self, cart_id: &CartId) -> StoreResult<Vec<CartItem>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        Ok(tables.cart_items.get(cart_id).cloned().unwrap_or_default())
    }

    async fn insert_cart_item(&self, item: CartItem) -> StoreResult<()> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        let items = tables.cart_items.entry(item.cart_id).or_default();
        if items.iter().any(|i| i.variant_id == item.variant_id) {
            return Err(StoreError::Conflict {
                entity: "cart_item",
                detail: format!(
                    "variant {} is already in cart {}",
                    item.variant_id, item.cart_id
                ),
            });
        }
        items.push(item);
        Ok(())
    }

    async fn update_cart_item(&self, item: CartItem) -> StoreResult<bool> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        let Some(items) = tables.cart_items.get_mut(&item.cart_id) else {
            return Ok(false);
        };
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                *existing = item;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        let Some(items) = tables.cart_items.get_mut(cart_id) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|i| i.id != *item_id);
        Ok(items.len() < before)
    }

    async fn clear_cart(&self, cart_id: &CartId) -> StoreResult<usize> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        let Some(items) = tables.cart_items.get_mut(cart_id) else {
            return Ok(0);
        };
        let removed = items.len();
        items.clear();
        Ok(removed)
    }

    async fn order(
        &self,
        user: &UserId,
        id: &OrderId,
    ) -> StoreResult<Option<(Order, Vec<OrderItem>)>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        match tables.orders.get(id) {
            Some(order) if order.user_id == *user => {
                let items = tables.order_items.get(id).cloned().unwrap_or_default();
                Ok(Some((order.clone(), items)))
            }
            _ => Ok(None),
        }
    }

    async fn orders_for_user(&self, user: &UserId) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == *user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().expect("RwLock poisoned");
        let Some(order) = tables.orders.get_mut(id) else {
            return Ok(false);
        };
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Timestamp::now();
        Ok(true)
    }

    async fn commit_checkout(
        &self,
        lease: &Self::VariantLease,
        batch: CheckoutBatch,
    ) -> StoreResult<()> {
        // Every decremented row must be covered by the lease the caller
        // validated against.
        for (variant_id, _) in &batch.decrements {
            if !lease.ids().contains(variant_id) {
                return Err(StoreError::Internal(format!(
                    "variant {variant_id} is not covered by the checkout lease"
                )));
            }
        }

        let mut tables = self.tables.write().expect("RwLock poisoned");
        if tables.orders.contains_key(&batch.order.id) {
            return Err(StoreError::Conflict {
                entity: "order",
                detail: format!("order {} already exists", batch.order.id),
            });
        }

        // First pass: check every stock condition. Nothing is applied until
        // all of them hold.
        let mut staged = Vec::with_capacity(batch.decrements.len());
        for (variant_id, quantity) in &batch.decrements {
            let remaining = tables
                .variants
                .get(variant_id)
                .and_then(|v| v.stock.take(*quantity));
            match remaining {
                Some(remaining) => staged.push((*variant_id, remaining)),
                None => {
                    return Err(StoreError::StockConflict {
                        variant_id: *variant_id,
                        requested: *quantity,
                    });
                }
            }
        }

        // All conditions hold; apply the whole batch.
        let now = Timestamp::now();
        for (variant_id, remaining) in staged {
            if let Some(variant) = tables.variants.get_mut(&variant_id) {
                variant.stock = remaining;
                variant.updated_at = now;
            }
        }
        let order_id = batch.order.id;
        tables.order_items.insert(order_id, batch.items);
        tables.orders.insert(order_id, batch.order);
        if let Some(items) = tables.cart_items.get_mut(&batch.cart_id) {
            items.clear();
        }

        debug!(order_id = %order_id, "checkout batch committed");
        Ok(())
    }
}
