//! Checkout: turning a mutable cart into an immutable order.
//!
//! The pipeline runs as one unit of work: load the cart under its lease,
//! lease every affected variant row in sorted order, re-validate against
//! the leased snapshot, snapshot prices into an order, and hand the store
//! a single batch that persists the order, takes the stock, and clears the
//! cart atomically. A failure at any step leaves nothing behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::cart::CartItem;
use crate::errors::{
    CheckoutError, CheckoutResult, InventoryError, OrderError, OrderResult, StoreError,
};
use crate::inventory::InventoryLedger;
use crate::order::{Order, OrderDetail, OrderItem, OrderStatus};
use crate::pricing::PricingPolicy;
use crate::store::{CheckoutBatch, CommerceStore, VariantLease};
use crate::types::{Money, OrderId, Quantity, UserId, VariantId};

/// Service running checkouts and owning the order lifecycle.
pub struct CheckoutOrchestrator<S> {
    store: Arc<S>,
    ledger: InventoryLedger<S>,
    pricing: PricingPolicy,
}

impl<S> Clone for CheckoutOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: self.ledger.clone(),
            pricing: self.pricing,
        }
    }
}

impl<S: CommerceStore> CheckoutOrchestrator<S> {
    /// Creates an orchestrator over the given store and pricing policy.
    pub fn new(store: Arc<S>, pricing: PricingPolicy) -> Self {
        let ledger = InventoryLedger::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            pricing,
        }
    }

    /// Converts the user's cart into a pending order.
    ///
    /// Either the whole checkout commits (order persisted, stock taken,
    /// cart cleared) or none of it does. The first failing item aborts the
    /// whole attempt; there are no partial orders.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn checkout(&self, user: &UserId) -> CheckoutResult<OrderDetail> {
        let _cart_lease = self.store.lock_cart(user).await?;

        let cart = self
            .store
            .cart(user)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let items = self.store.cart_items(&cart.id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Lease every affected variant row; the ledger sorts and dedups so
        // overlapping checkouts acquire in the same order.
        let variant_ids: Vec<VariantId> = items.iter().map(|item| item.variant_id).collect();
        let lease = self.ledger.lock_variants(&variant_ids).await?;

        // Re-validate each line against the leased snapshot and capture the
        // unit price that the order will keep.
        let mut priced_items: Vec<(&CartItem, Money)> = Vec::with_capacity(items.len());
        for item in &items {
            let variant = lease
                .variant(&item.variant_id)
                .ok_or(CheckoutError::VariantGone(item.variant_id))?;
            self.ledger.validate_stock(variant, item.quantity)?;
            priced_items.push((item, variant.price));
        }

        let mut subtotal = Money::zero();
        for (item, unit_price) in &priced_items {
            subtotal = subtotal.checked_add(unit_price.times(item.quantity)?)?;
        }
        let quote = self.pricing.quote(subtotal)?;

        let order = Order::new(user.clone(), quote);
        let order_id = order.id;
        let order_items: Vec<OrderItem> = priced_items
            .iter()
            .map(|&(item, unit_price)| OrderItem::snapshot(order_id, item, unit_price))
            .collect();

        // The uniqueness constraint keeps one line per variant, but the
        // aggregation must not rely on it.
        let mut decrements: BTreeMap<VariantId, Quantity> = BTreeMap::new();
        for (item, _) in &priced_items {
            let quantity = match decrements.get(&item.variant_id) {
                Some(existing) => existing.checked_add(item.quantity)?,
                None => item.quantity,
            };
            decrements.insert(item.variant_id, quantity);
        }

        let batch = CheckoutBatch {
            cart_id: cart.id,
            order,
            items: order_items,
            decrements: decrements.into_iter().collect(),
        };

        match self.store.commit_checkout(&lease, batch).await {
            Ok(()) => {}
            Err(StoreError::StockConflict {
                variant_id,
                requested,
            }) => {
                error!(
                    %variant_id,
                    %requested,
                    "checkout commit lost stock that validation saw under the lease"
                );
                return Err(CheckoutError::Inventory(
                    InventoryError::StockDecrementFailed {
                        variant_id,
                        requested,
                    },
                ));
            }
            Err(err) => return Err(CheckoutError::Store(err)),
        }
        drop(lease);

        let (order, items) = self
            .store
            .order(user, &order_id)
            .await?
            .ok_or_else(|| {
                StoreError::Internal(format!("order {order_id} vanished after commit"))
            })?;
        let detail = OrderDetail::new(order, items);
        info!(
            order_id = %order_id,
            total = %detail.order.total,
            lines = detail.items.len(),
            "checkout committed"
        );
        Ok(detail)
    }

    /// The user's orders, newest first.
    pub async fn orders(&self, user: &UserId) -> OrderResult<Vec<Order>> {
        Ok(self.store.orders_for_user(user).await?)
    }

    /// One order with its items.
    pub async fn order(&self, user: &UserId, id: &OrderId) -> OrderResult<OrderDetail> {
        let (order, items) = self
            .store
            .order(user, id)
            .await?
            .ok_or(OrderError::NotFound(*id))?;
        Ok(OrderDetail::new(order, items))
    }

    /// Moves an order one step forward in its lifecycle.
    ///
    /// Cancellation is not a forward step; use
    /// [`Self::cancel_order`], which also returns the stock.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn advance_order(
        &self,
        user: &UserId,
        id: &OrderId,
        to: OrderStatus,
    ) -> OrderResult<OrderDetail> {
        if to == OrderStatus::Cancelled {
            let (order, _) = self
                .store
                .order(user, id)
                .await?
                .ok_or(OrderError::NotFound(*id))?;
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to,
            });
        }
        self.transition(user, id, to).await?;
        self.order(user, id).await
    }

    /// Cancels an order that has not started fulfilment and returns its
    /// stock to inventory.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn cancel_order(&self, user: &UserId, id: &OrderId) -> OrderResult<OrderDetail> {
        let detail = self.transition(user, id, OrderStatus::Cancelled).await?;
        for item in &detail.items {
            self.ledger
                .increase_stock(&item.variant_id, item.quantity)
                .await?;
        }
        info!(order_id = %id, lines = detail.items.len(), "order cancelled and restocked");
        self.order(user, id).await
    }

    /// Applies a validated, conditional status change.
    async fn transition(
        &self,
        user: &UserId,
        id: &OrderId,
        to: OrderStatus,
    ) -> OrderResult<OrderDetail> {
        let (order, items) = self
            .store
            .order(user, id)
            .await?
            .ok_or(OrderError::NotFound(*id))?;
        if !order.status.can_transition_to(to) {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to,
            });
        }
        // Conditional on the status we just read: a concurrent transition
        // loses the race instead of being silently overwritten.
        if !self.store.update_order_status(id, order.status, to).await? {
            warn!(order_id = %id, from = %order.status, to = %to, "status transition lost a race");
            return Err(OrderError::Conflict(*id));
        }
        Ok(OrderDetail::new(order, items))
    }
}
