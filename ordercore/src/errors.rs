//! Error types for `OrderCore`.
//!
//! Each subsystem has its own error enum so callers can handle failures
//! precisely:
//!
//! - [`ValidationError`]: smart-constructor rejections (bad quantity, bad
//!   amount). Rare at runtime because validation happens at construction.
//! - [`StoreError`]: storage-layer failures (unique-constraint conflicts,
//!   failed conditional updates).
//! - [`InventoryError`]: stock and variant availability failures.
//! - [`CartError`], [`CheckoutError`], [`OrderError`], [`CatalogError`]:
//!   service-level failures, each layering the errors beneath them.
//!
//! All business-rule failures abort the enclosing unit of work; no partial
//! state is ever committed. The boundary layer maps these to user-facing
//! responses; the core only provides a structured kind plus context fields.

use thiserror::Error;

use crate::order::OrderStatus;
use crate::types::{CartItemId, OrderId, ProductId, Quantity, StockQuantity, VariantId};

/// A value failed its smart-constructor validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Invalid monetary amount (negative, too precise, or out of range).
    #[error("invalid amount: {0}")]
    InvalidMoney(String),

    /// Invalid quantity (zero or above the per-line maximum).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Invalid tax rate (outside [0, 1] or too precise).
    #[error("invalid tax rate: {0}")]
    InvalidTaxRate(String),
}

/// Result type for value construction and pure computations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors surfaced by a [`CommerceStore`](crate::store::CommerceStore)
/// implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A unique constraint was violated, typically by a concurrent writer.
    /// The caller should retry the read.
    #[error("conflict on {entity}: {detail}")]
    Conflict {
        /// The kind of row involved (e.g. `"cart_item"`, `"variant"`).
        entity: &'static str,
        /// What collided.
        detail: String,
    },

    /// A conditional stock decrement inside a checkout commit found less
    /// stock than the locked validation saw. Nothing was applied.
    #[error("stock conflict on variant {variant_id}: could not take {requested}")]
    StockConflict {
        /// The variant whose decrement condition failed.
        variant_id: VariantId,
        /// The quantity the commit tried to take.
        requested: Quantity,
    },

    /// An unexpected internal storage error.
    #[error("internal store error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the inventory ledger.
///
/// `OutOfStock` and `VariantInactive` are user-correctable business-rule
/// violations. `StockDecrementFailed` is not: it means a conditional
/// decrement failed despite upstream validation under a row lease, i.e. the
/// locking discipline was violated somewhere. It is logged as a serious
/// internal error before being surfaced.
#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    /// No variant exists with the given id.
    #[error("variant {0} not found")]
    VariantNotFound(VariantId),

    /// The variant exists but has been deactivated.
    #[error("variant {0} is no longer available")]
    VariantInactive(VariantId),

    /// Requested more units than are in stock.
    #[error("insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    OutOfStock {
        /// The variant that cannot be fulfilled.
        variant_id: VariantId,
        /// The quantity that was requested.
        requested: Quantity,
        /// The stock available at validation time.
        available: StockQuantity,
    },

    /// A conditional decrement failed. Indicates a locking bug, not a
    /// normal user error.
    #[error("failed to decrease stock for variant {variant_id} by {requested}")]
    StockDecrementFailed {
        /// The variant whose stock could not be taken.
        variant_id: VariantId,
        /// The quantity the decrement tried to take.
        requested: Quantity,
    },

    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors from cart operations.
#[derive(Debug, Clone, Error)]
pub enum CartError {
    /// The item does not exist in this user's cart.
    #[error("cart item {0} not found")]
    ItemNotFound(CartItemId),

    /// A quantity failed validation (e.g. summing past the line maximum).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Stock or availability check failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for cart operations.
pub type CartResult<T> = Result<T, CartError>;

/// Errors from the checkout pipeline.
///
/// Any of these aborts the whole checkout: no order, no order items, and no
/// stock decrement survive a failure.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// The cart has no items to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart item references a variant that no longer exists.
    #[error("variant {0} no longer exists")]
    VariantGone(VariantId),

    /// Stock or availability re-validation failed under the lease.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Totals could not be computed (amount out of range).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Errors from order reads and status transitions.
#[derive(Debug, Clone, Error)]
pub enum OrderError {
    /// No such order for this user.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The requested status change is not allowed by the order lifecycle.
    #[error("cannot transition order from {from} to {to}")]
    InvalidStatusTransition {
        /// Status the order currently has.
        from: OrderStatus,
        /// Status the caller asked for.
        to: OrderStatus,
    },

    /// The order changed concurrently; re-read and retry.
    #[error("order {0} was modified concurrently")]
    Conflict(OrderId),

    /// Restocking after cancellation failed at the inventory layer.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for order operations.
pub type OrderResult<T> = Result<T, OrderError>;

/// Errors from the catalog admin surface.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// No product exists with the given id (or it is inactive and hidden).
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// No variant exists with the given id.
    #[error("variant {0} not found")]
    VariantNotFound(VariantId),

    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quantity;

    #[test]
    fn out_of_stock_display_carries_context() {
        let err = InventoryError::OutOfStock {
            variant_id: VariantId::new(),
            requested: Quantity::new(5).unwrap(),
            available: StockQuantity::new(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 5"));
        assert!(msg.contains("available 2"));
    }

    #[test]
    fn store_errors_layer_into_service_errors() {
        let store_err = StoreError::Conflict {
            entity: "cart_item",
            detail: "duplicate variant".to_string(),
        };
        let cart_err: CartError = store_err.into();
        assert!(matches!(cart_err, CartError::Store(StoreError::Conflict { .. })));
    }

    #[test]
    fn inventory_errors_layer_into_checkout_errors() {
        let inv = InventoryError::VariantInactive(VariantId::new());
        let checkout: CheckoutError = inv.into();
        assert!(matches!(
            checkout,
            CheckoutError::Inventory(InventoryError::VariantInactive(_))
        ));
    }

    #[test]
    fn transition_error_names_both_states() {
        let err = OrderError::InvalidStatusTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(
            err.to_string(),
            "cannot transition order from delivered to cancelled"
        );
    }
}
