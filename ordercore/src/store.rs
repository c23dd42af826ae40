//! Storage port for `OrderCore`.
//!
//! [`CommerceStore`] is the backend-independent interface the services are
//! built against. It replaces ambient framework transactions with two
//! explicit primitives:
//!
//! - **Row leases** ([`CommerceStore::lock_variants`],
//!   [`CommerceStore::lock_cart`]): exclusive holds on specific rows,
//!   acquired in deterministic sorted order and released on drop. A lease
//!   serializes every read-then-write of the rows it covers.
//! - **Batch commit** ([`CommerceStore::commit_checkout`]): an
//!   all-or-nothing application of a whole checkout, validated in full
//!   before anything is applied.
//!
//! Point mutations that would otherwise be read-modify-write races
//! (stock changes, status transitions) are conditional updates instead:
//! they succeed only when the row still looks the way the caller assumed,
//! and report `false` otherwise.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartItem};
use crate::catalog::{Product, ProductVariant};
use crate::errors::StoreResult;
use crate::order::{Order, OrderItem, OrderStatus};
use crate::types::{CartId, CartItemId, OrderId, ProductId, Quantity, UserId, VariantId};

/// Exclusive hold over a set of variant rows.
///
/// The lease owns a snapshot of the locked rows taken under the lock, so
/// every read through it observes the state no concurrent writer can be
/// mutating. Dropping the lease releases the rows.
pub trait VariantLease: Send + Sync {
    /// The locked row for `id`, if it existed at lock time.
    fn variant(&self, id: &VariantId) -> Option<&ProductVariant>;

    /// The ids this lease covers, sorted and deduplicated.
    fn ids(&self) -> &[VariantId];
}

/// Everything a checkout persists, applied atomically by
/// [`CommerceStore::commit_checkout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutBatch {
    /// The cart to clear once the order is persisted.
    pub cart_id: CartId,
    /// The order header to insert.
    pub order: Order,
    /// The order lines to insert.
    pub items: Vec<OrderItem>,
    /// Stock to take per variant, aggregated and sorted by id. Every id
    /// listed here must be covered by the lease passed alongside the batch.
    pub decrements: Vec<(VariantId, Quantity)>,
}

/// The storage interface all backends must satisfy.
///
/// Implementations must guarantee:
///
/// - `lock_variants` acquires row locks in ascending id order so that
///   overlapping acquisitions cannot deadlock.
/// - `get_or_create_cart` never creates two carts for one user, no matter
///   how many tasks race it.
/// - `insert_cart_item` enforces the (cart, variant) uniqueness constraint
///   and reports a violation as [`StoreError::Conflict`].
/// - `commit_checkout` applies the whole batch or none of it. A decrement
///   whose condition fails surfaces as [`StoreError::StockConflict`] with
///   no other effect.
///
/// [`StoreError::Conflict`]: crate::errors::StoreError::Conflict
/// [`StoreError::StockConflict`]: crate::errors::StoreError::StockConflict
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Lease type returned by [`Self::lock_variants`].
    type VariantLease: VariantLease;

    /// Lease type returned by [`Self::lock_cart`]; held for its `Drop`.
    type CartLease: Send + Sync;

    // --- catalog ---------------------------------------------------------

    /// Inserts a product. Fails with `Conflict` when the id exists.
    async fn insert_product(&self, product: Product) -> StoreResult<()>;

    /// Reads a product by id.
    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>>;

    /// Reads all products, newest first.
    async fn products(&self) -> StoreResult<Vec<Product>>;

    /// Replaces a product row. Returns `false` when the row is missing.
    async fn update_product(&self, product: Product) -> StoreResult<bool>;

    /// Inserts a variant. Fails with `Conflict` when the id or a non-empty
    /// SKU already exists.
    async fn insert_variant(&self, variant: ProductVariant) -> StoreResult<()>;

    /// Reads a variant by id without locking. Callers that intend to write
    /// must go through [`Self::lock_variants`] instead.
    async fn variant(&self, id: &VariantId) -> StoreResult<Option<ProductVariant>>;

    /// Reads all variants of a product, cheapest first.
    async fn variants_for_product(
        &self,
        product_id: &ProductId,
    ) -> StoreResult<Vec<ProductVariant>>;

    /// Replaces a variant row. Returns `false` when the row is missing.
    /// Callers must hold the variant's lease.
    async fn update_variant(&self, variant: ProductVariant) -> StoreResult<bool>;

    // --- inventory -------------------------------------------------------

    /// Acquires exclusive leases on the given variants in ascending id
    /// order. Ids are deduplicated; unknown ids are simply absent from the
    /// lease. Blocks until every lock is held.
    async fn lock_variants(&self, ids: &[VariantId]) -> StoreResult<Self::VariantLease>;

    /// Conditionally decrements stock: succeeds and returns `true` only
    /// when current stock can satisfy `quantity`. Atomic; never a
    /// read-modify-write in caller memory.
    async fn decrease_stock(&self, id: &VariantId, quantity: Quantity) -> StoreResult<bool>;

    /// Unconditionally increments stock (restock, cancellation). A missing
    /// variant is a no-op.
    async fn increase_stock(&self, id: &VariantId, quantity: Quantity) -> StoreResult<()>;

    // --- carts -----------------------------------------------------------

    /// Acquires the exclusive lease serializing mutations of one user's
    /// cart.
    async fn lock_cart(&self, user: &UserId) -> StoreResult<Self::CartLease>;

    /// Returns the user's cart, creating it if missing. Concurrent calls
    /// for one user observe a single cart.
    async fn get_or_create_cart(&self, user: &UserId) -> StoreResult<Cart>;

    /// Returns the user's cart if one exists.
    async fn cart(&self, user: &UserId) -> StoreResult<Option<Cart>>;

    /// Reads all items of a cart.
    async fn cart_items(&self, cart_id: &CartId) -> StoreResult<Vec<CartItem>>;

    /// Inserts a cart item. Fails with `Conflict` when the cart already
    /// holds the item's variant.
    async fn insert_cart_item(&self, item: CartItem) -> StoreResult<()>;

    /// Replaces a cart item row. Returns `false` when the row is missing.
    async fn update_cart_item(&self, item: CartItem) -> StoreResult<bool>;

    /// Deletes one cart item. Returns `false` when the row is missing.
    async fn delete_cart_item(&self, cart_id: &CartId, item_id: &CartItemId)
        -> StoreResult<bool>;

    /// Deletes every item of a cart, returning how many were removed.
    async fn clear_cart(&self, cart_id: &CartId) -> StoreResult<usize>;

    // --- orders ----------------------------------------------------------

    /// Reads one order with its items, scoped to the owning user.
    async fn order(
        &self,
        user: &UserId,
        id: &OrderId,
    ) -> StoreResult<Option<(Order, Vec<OrderItem>)>>;

    /// Reads a user's orders, newest first.
    async fn orders_for_user(&self, user: &UserId) -> StoreResult<Vec<Order>>;

    /// Conditionally moves an order from `from` to `to`. Returns `false`
    /// when the order is missing or its status is no longer `from`.
    async fn update_order_status(
        &self,
        id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool>;

    // --- checkout --------------------------------------------------------

    /// Applies a checkout batch atomically while the caller holds the
    /// variant lease: inserts the order and its items, conditionally
    /// decrements each listed variant, and clears the cart. Nothing is
    /// applied when any decrement condition fails.
    async fn commit_checkout(
        &self,
        lease: &Self::VariantLease,
        batch: CheckoutBatch,
    ) -> StoreResult<()>;
}
