//! Shopping carts: entities, derived views, and the mutation service.
//!
//! A cart stages a future order and nothing more; it is created lazily on
//! first access, holds at most one line per variant, and is cleared by a
//! successful checkout. Line totals and the subtotal reflect live catalog
//! prices because nothing has been committed yet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::catalog::ProductVariant;
use crate::errors::{CartError, CartResult, InventoryError, ValidationResult};
use crate::inventory::InventoryLedger;
use crate::store::CommerceStore;
use crate::types::{CartId, CartItemId, Money, Quantity, Timestamp, UserId, VariantId};

/// A user's shopping cart. One per user, created lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Unique cart identifier.
    pub id: CartId,
    /// The owning user (1:1).
    pub user_id: UserId,
    /// When the cart was created.
    pub created_at: Timestamp,
    /// When the cart was last touched.
    pub updated_at: Timestamp,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: UserId) -> Self {
        let now = Timestamp::now();
        Self {
            id: CartId::new(),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single line inside a cart. At most one per (cart, variant) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Unique line identifier.
    pub id: CartItemId,
    /// The cart this line belongs to.
    pub cart_id: CartId,
    /// The variant staged for purchase.
    pub variant_id: VariantId,
    /// Units staged. Always at least 1.
    pub quantity: Quantity,
    /// Free-text note from the shopper.
    pub note: String,
    /// When the line was created.
    pub created_at: Timestamp,
    /// When the line was last modified.
    pub updated_at: Timestamp,
}

impl CartItem {
    /// Creates a line for a cart.
    pub fn new(cart_id: CartId, variant_id: VariantId, quantity: Quantity, note: String) -> Self {
        let now = Timestamp::now();
        Self {
            id: CartItemId::new(),
            cart_id,
            variant_id,
            quantity,
            note,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A cart line joined with its live variant, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The stored line.
    pub item: CartItem,
    /// The variant as it currently is in the catalog.
    pub variant: ProductVariant,
}

impl CartLine {
    /// Line total at the live price: `variant.price × quantity`.
    pub fn line_total(&self) -> ValidationResult<Money> {
        self.variant.price.times(self.item.quantity)
    }
}

/// A cart joined with its lines. Subtotal and item count are derived on
/// read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    /// The cart header.
    pub cart: Cart,
    /// All lines with their live variants.
    pub lines: Vec<CartLine>,
}

impl CartView {
    /// Number of lines in the cart.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of live line totals.
    pub fn subtotal(&self) -> ValidationResult<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?))
    }
}

/// Service owning cart and cart-item lifecycle.
///
/// Every mutation runs under the user's cart lease, so concurrent requests
/// from the same user (a double-clicked "add", for instance) serialize
/// instead of losing updates. Stock checks delegate to the inventory
/// ledger.
pub struct CartStore<S> {
    store: Arc<S>,
    ledger: InventoryLedger<S>,
}

impl<S> Clone for CartStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: CommerceStore> CartStore<S> {
    /// Creates a cart service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        let ledger = InventoryLedger::new(Arc::clone(&store));
        Self { store, ledger }
    }

    /// Returns the user's cart, creating it on first access. Idempotent.
    pub async fn get_or_create_cart(&self, user: &UserId) -> CartResult<Cart> {
        Ok(self.store.get_or_create_cart(user).await?)
    }

    /// The user's cart joined with lines and live variants.
    pub async fn view(&self, user: &UserId) -> CartResult<CartView> {
        let cart = self.store.get_or_create_cart(user).await?;
        let items = self.store.cart_items(&cart.id).await?;
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let variant = self
                .store
                .variant(&item.variant_id)
                .await?
                .ok_or(InventoryError::VariantNotFound(item.variant_id))?;
            lines.push(CartLine { item, variant });
        }
        Ok(CartView { cart, lines })
    }

    /// Adds a variant to the cart, folding into an existing line when the
    /// variant is already staged.
    ///
    /// The requested quantity is validated against stock; when folding, the
    /// *new total* is validated instead. A non-empty `note` replaces the
    /// stored note; an empty one leaves it alone. Returns the line and
    /// whether it was newly created.
    #[instrument(skip(self, note), fields(user = %user))]
    pub async fn add_item(
        &self,
        user: &UserId,
        variant_id: &VariantId,
        quantity: Quantity,
        note: &str,
    ) -> CartResult<(CartItem, bool)> {
        let _lease = self.store.lock_cart(user).await?;
        let cart = self.store.get_or_create_cart(user).await?;

        let variant = self.ledger.variant(variant_id).await?;
        self.ledger.validate_stock(&variant, quantity)?;

        let items = self.store.cart_items(&cart.id).await?;
        let existing = items.into_iter().find(|i| i.variant_id == *variant_id);

        match existing {
            Some(mut item) => {
                let new_quantity = item.quantity.checked_add(quantity)?;
                self.ledger.validate_stock(&variant, new_quantity)?;
                item.quantity = new_quantity;
                if !note.is_empty() {
                    item.note = note.to_string();
                }
                item.updated_at = Timestamp::now();
                if !self.store.update_cart_item(item.clone()).await? {
                    return Err(CartError::ItemNotFound(item.id));
                }
                debug!(item_id = %item.id, quantity = %item.quantity, "cart line incremented");
                Ok((item, false))
            }
            None => {
                let item = CartItem::new(cart.id, *variant_id, quantity, note.to_string());
                self.store.insert_cart_item(item.clone()).await?;
                debug!(item_id = %item.id, quantity = %item.quantity, "cart line created");
                Ok((item, true))
            }
        }
    }

    /// Updates the quantity and/or note of an existing line.
    ///
    /// A new quantity is re-validated against current stock; on failure the
    /// line is left unchanged. A note, when given, replaces the stored note
    /// even if empty.
    #[instrument(skip(self, note), fields(user = %user))]
    pub async fn update_item(
        &self,
        user: &UserId,
        item_id: &CartItemId,
        quantity: Option<Quantity>,
        note: Option<String>,
    ) -> CartResult<CartItem> {
        let _lease = self.store.lock_cart(user).await?;
        let mut item = self.find_item(user, item_id).await?;

        if let Some(quantity) = quantity {
            let variant = self.ledger.variant(&item.variant_id).await?;
            self.ledger.validate_stock(&variant, quantity)?;
            item.quantity = quantity;
        }
        if let Some(note) = note {
            item.note = note;
        }
        item.updated_at = Timestamp::now();
        if !self.store.update_cart_item(item.clone()).await? {
            return Err(CartError::ItemNotFound(*item_id));
        }
        Ok(item)
    }

    /// Removes one line from the cart.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn remove_item(&self, user: &UserId, item_id: &CartItemId) -> CartResult<()> {
        let _lease = self.store.lock_cart(user).await?;
        let item = self.find_item(user, item_id).await?;
        if !self.store.delete_cart_item(&item.cart_id, item_id).await? {
            return Err(CartError::ItemNotFound(*item_id));
        }
        debug!(item_id = %item_id, "cart line removed");
        Ok(())
    }

    /// Empties the cart. A no-op on an empty or missing cart.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn clear(&self, user: &UserId) -> CartResult<()> {
        let _lease = self.store.lock_cart(user).await?;
        if let Some(cart) = self.store.cart(user).await? {
            let removed = self.store.clear_cart(&cart.id).await?;
            debug!(cart_id = %cart.id, removed, "cart cleared");
        }
        Ok(())
    }

    /// Looks up a line and verifies it belongs to this user's cart.
    async fn find_item(&self, user: &UserId, item_id: &CartItemId) -> CartResult<CartItem> {
        let cart = self
            .store
            .cart(user)
            .await?
            .ok_or(CartError::ItemNotFound(*item_id))?;
        self.store
            .cart_items(&cart.id)
            .await?
            .into_iter()
            .find(|item| item.id == *item_id)
            .ok_or(CartError::ItemNotFound(*item_id))
    }
}
