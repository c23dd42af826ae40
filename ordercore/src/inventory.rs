//! Inventory ledger: the only writer of variant stock.
//!
//! All stock movements go through this service. Reads that precede a write
//! must go through [`InventoryLedger::lock_variants`] so the write happens
//! against a leased snapshot; point mutations are conditional updates in
//! the store, never read-modify-write in application memory.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::catalog::ProductVariant;
use crate::errors::{InventoryError, InventoryResult};
use crate::store::CommerceStore;
use crate::types::{Quantity, VariantId};

/// Service owning variant stock.
pub struct InventoryLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> InventoryLedger<S> {
    /// Creates a ledger over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Checks that a variant can fulfil a requested quantity.
    ///
    /// Pure: no storage access, no mutation. Inactive variants fail before
    /// stock is even considered.
    pub fn validate_stock(
        &self,
        variant: &ProductVariant,
        requested: Quantity,
    ) -> InventoryResult<()> {
        if !variant.active {
            return Err(InventoryError::VariantInactive(variant.id));
        }
        if !variant.stock.satisfies(requested) {
            return Err(InventoryError::OutOfStock {
                variant_id: variant.id,
                requested,
                available: variant.stock,
            });
        }
        Ok(())
    }
}

impl<S: CommerceStore> InventoryLedger<S> {
    /// Fetches a variant, failing when it does not exist.
    pub async fn variant(&self, id: &VariantId) -> InventoryResult<ProductVariant> {
        self.store
            .variant(id)
            .await?
            .ok_or(InventoryError::VariantNotFound(*id))
    }

    /// Acquires exclusive row leases on the given variants.
    ///
    /// Ids are deduplicated and locked in ascending order, so two
    /// acquisitions over overlapping sets can never deadlock. The lease
    /// holds until dropped.
    #[instrument(skip(self, ids))]
    pub async fn lock_variants(&self, ids: &[VariantId]) -> InventoryResult<S::VariantLease> {
        let ordered: BTreeSet<VariantId> = ids.iter().copied().collect();
        let ordered: Vec<VariantId> = ordered.into_iter().collect();
        debug!(count = ordered.len(), "locking variant rows");
        Ok(self.store.lock_variants(&ordered).await?)
    }

    /// Takes `quantity` units of stock from a variant.
    ///
    /// The decrement is conditional on sufficient stock. A failed condition
    /// means validation under the lease was bypassed somewhere upstream, so
    /// it is logged as a serious internal error rather than treated as a
    /// normal out-of-stock.
    #[instrument(skip(self))]
    pub async fn decrease_stock(
        &self,
        id: &VariantId,
        quantity: Quantity,
    ) -> InventoryResult<()> {
        if self.store.decrease_stock(id, quantity).await? {
            debug!(variant_id = %id, %quantity, "stock decreased");
            Ok(())
        } else {
            error!(
                variant_id = %id,
                %quantity,
                "conditional stock decrement failed; lock discipline was violated upstream"
            );
            Err(InventoryError::StockDecrementFailed {
                variant_id: *id,
                requested: quantity,
            })
        }
    }

    /// Returns `quantity` units of stock to a variant (restock or
    /// cancellation). Always succeeds.
    #[instrument(skip(self))]
    pub async fn increase_stock(
        &self,
        id: &VariantId,
        quantity: Quantity,
    ) -> InventoryResult<()> {
        self.store.increase_stock(id, quantity).await?;
        debug!(variant_id = %id, %quantity, "stock increased");
        Ok(())
    }
}
