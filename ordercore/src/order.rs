//! Orders and order line items.
//!
//! An [`Order`] is the immutable result of a checkout. Its monetary fields
//! are snapshots taken at creation; only the status ever changes afterwards,
//! and only along the transitions [`OrderStatus`] allows.

use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::errors::ValidationResult;
use crate::pricing::PriceQuote;
use crate::types::{Money, OrderId, OrderItemId, Quantity, Timestamp, UserId, VariantId};

/// Lifecycle status of an order.
///
/// Orders move forward one step at a time: pending → confirmed →
/// processing → shipped → delivered. Cancellation is only reachable from
/// `Pending` or `Confirmed`, before fulfilment starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created by checkout, not yet confirmed.
    Pending,
    /// Accepted and awaiting fulfilment.
    Confirmed,
    /// Being picked and packed.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer. Terminal.
    Delivered,
    /// Cancelled before fulfilment; stock has been returned. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Whether the lifecycle permits moving from `self` to `to`.
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Pending | Self::Confirmed, Self::Cancelled)
        )
    }

    /// Whether no further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// An order placed by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// The user who placed the order.
    pub user_id: UserId,
    /// Sum of line totals, snapshotted at checkout.
    pub subtotal: Money,
    /// Tax on the subtotal, snapshotted at checkout.
    pub tax: Money,
    /// Subtotal plus tax, snapshotted at checkout.
    pub total: Money,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// When the order was created.
    pub created_at: Timestamp,
    /// When the order was last modified (status changes only).
    pub updated_at: Timestamp,
}

impl Order {
    /// Creates a pending order from a price quote.
    pub fn new(user_id: UserId, quote: PriceQuote) -> Self {
        let now = Timestamp::now();
        Self {
            id: OrderId::new(),
            user_id,
            subtotal: quote.subtotal,
            tax: quote.tax,
            total: quote.total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable snapshot of a cart item at purchase time.
///
/// Stores its own `price_at_purchase` so later catalog price changes never
/// affect a placed order. The variant id is kept for traceability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique line identifier; sort order matches creation order.
    pub id: OrderItemId,
    /// The order this line belongs to.
    pub order_id: OrderId,
    /// The variant that was purchased.
    pub variant_id: VariantId,
    /// Units purchased.
    pub quantity: Quantity,
    /// Unit price captured under the variant lease at checkout.
    pub price_at_purchase: Money,
    /// Free-text note carried over from the cart item.
    pub note: String,
}

impl OrderItem {
    /// Snapshots a cart item at the given locked unit price.
    pub fn snapshot(order_id: OrderId, item: &CartItem, unit_price: Money) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            price_at_purchase: unit_price,
            note: item.note.clone(),
        }
    }

    /// Line total at the purchase-time price.
    pub fn line_total(&self) -> ValidationResult<Money> {
        self.price_at_purchase.times(self.quantity)
    }
}

/// An order together with its line items, as returned to the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// The order header.
    pub order: Order,
    /// Line items, ordered by id (creation order).
    pub items: Vec<OrderItem>,
}

impl OrderDetail {
    /// Pairs an order with its items, normalising item order.
    pub fn new(order: Order, mut items: Vec<OrderItem>) -> Self {
        items.sort_by_key(|item| item.id);
        Self { order, items }
    }

    /// Recomputes the sum of line totals from the snapshots.
    ///
    /// Always equals `order.subtotal` for an order produced by checkout.
    pub fn items_total(&self) -> ValidationResult<Money> {
        self.items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.line_total()?))
    }
}
