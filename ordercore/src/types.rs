//! Core identifier and value types for `OrderCore`.
//!
//! All types use smart constructors so that an instance, once constructed,
//! is always valid. Entity identifiers are UUIDv7, which gives them a
//! monotonic sort order matching creation order.

use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;

/// Identifier of a catalog product.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, Serialize,
        Deserialize
    )
)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Creates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a purchasable product variant.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, Serialize,
        Deserialize
    )
)]
pub struct VariantId(Uuid);

impl VariantId {
    /// Creates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for VariantId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a shopping cart.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, Serialize,
        Deserialize
    )
)]
pub struct CartId(Uuid);

impl CartId {
    /// Creates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for CartId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a single line item inside a cart.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, Serialize,
        Deserialize
    )
)]
pub struct CartItemId(Uuid);

impl CartItemId {
    /// Creates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for CartItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a placed order.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, Serialize,
        Deserialize
    )
)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of an order line item.
///
/// Line items are returned sorted by id, which preserves creation order
/// thanks to the UUIDv7 timestamp prefix.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, Serialize,
        Deserialize
    )
)]
pub struct OrderItemId(Uuid);

impl OrderItemId {
    /// Creates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for OrderItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque identity of an authenticated user.
///
/// The authentication layer supplies this value; the core trusts it and
/// only requires that it is non-empty. Carts are keyed 1:1 by user.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Deref, Display, Serialize,
        Deserialize
    )
)]
pub struct UserId(String);

/// Human-readable product name.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(Debug, Clone, PartialEq, Eq, AsRef, Deref, Display, Serialize, Deserialize)
)]
pub struct ProductName(String);

/// Stock keeping unit. Unique across all variants when present.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
    derive(Debug, Clone, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize)
)]
pub struct Sku(String);

/// Key of a variant attribute (e.g. `size`, `color`). Unique per variant.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 50),
    derive(
        Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Deref, Display, Serialize,
        Deserialize
    )
)]
pub struct AttributeKey(String);

/// A purchase quantity. Always at least 1.
///
/// Stock levels use [`StockQuantity`] instead, which permits zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// Maximum quantity accepted on a single line.
    pub const MAX_PER_LINE: u32 = 10_000;

    /// Creates a quantity, rejecting zero and values above
    /// [`Self::MAX_PER_LINE`].
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidQuantity(
                "quantity must be at least 1".to_string(),
            ));
        }
        if value > Self::MAX_PER_LINE {
            return Err(ValidationError::InvalidQuantity(format!(
                "quantity {value} exceeds maximum {}",
                Self::MAX_PER_LINE
            )));
        }
        Ok(Self(value))
    }

    /// Returns the underlying value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Adds two quantities, re-validating the sum against the line maximum.
    pub fn checked_add(self, other: Self) -> Result<Self, ValidationError> {
        let sum = self.0.checked_add(other.0).ok_or_else(|| {
            ValidationError::InvalidQuantity("quantity overflow".to_string())
        })?;
        Self::new(sum)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stock level. Zero is valid; negative is unrepresentable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct StockQuantity(u32);

impl StockQuantity {
    /// Creates a stock level.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this stock level can satisfy a requested quantity.
    pub const fn satisfies(self, requested: Quantity) -> bool {
        requested.value() <= self.0
    }

    /// Stock remaining after taking `quantity`, or `None` when the take
    /// would drive the level negative.
    pub fn take(self, quantity: Quantity) -> Option<Self> {
        self.0.checked_sub(quantity.value()).map(Self)
    }

    /// Stock after returning `quantity`. Saturates at the type maximum so
    /// restocking always succeeds.
    pub const fn put_back(self, quantity: Quantity) -> Self {
        Self(self.0.saturating_add(quantity.value()))
    }
}

impl std::fmt::Display for StockQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monetary amount with at most two decimal places, never negative.
///
/// Uses `Decimal` so that money arithmetic is exact. All arithmetic is
/// checked and re-validates the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Maximum representable amount (100 million).
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

    /// Creates a money amount from a decimal.
    pub fn new(amount: Decimal) -> Result<Self, ValidationError> {
        if amount.is_sign_negative() {
            return Err(ValidationError::InvalidMoney(format!(
                "amount cannot be negative: {amount}"
            )));
        }
        if amount.scale() > 2 {
            return Err(ValidationError::InvalidMoney(format!(
                "amount cannot have more than 2 decimal places: {amount}"
            )));
        }
        if amount > Self::MAX_AMOUNT {
            return Err(ValidationError::InvalidMoney(format!(
                "amount {amount} exceeds maximum {}",
                Self::MAX_AMOUNT
            )));
        }
        Ok(Self(amount))
    }

    /// Creates a money amount from whole cents, avoiding float pitfalls.
    pub fn from_cents(cents: u64) -> Result<Self, ValidationError> {
        let cents = i64::try_from(cents).map_err(|_| {
            ValidationError::InvalidMoney(format!("amount {cents} cents is out of range"))
        })?;
        Self::new(Decimal::new(cents, 2))
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal value.
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Adds two amounts, re-validating the sum.
    pub fn checked_add(self, other: Self) -> Result<Self, ValidationError> {
        let sum = self.0.checked_add(other.0).ok_or_else(|| {
            ValidationError::InvalidMoney("amount overflow".to_string())
        })?;
        Self::new(sum)
    }

    /// Multiplies a unit price by a quantity, producing a line total.
    pub fn times(self, quantity: Quantity) -> Result<Self, ValidationError> {
        let product = self
            .0
            .checked_mul(Decimal::from(quantity.value()))
            .ok_or_else(|| ValidationError::InvalidMoney("amount overflow".to_string()))?;
        Self::new(product)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = s.trim().parse::<Decimal>().map_err(|e| {
            ValidationError::InvalidMoney(format!("failed to parse amount '{s}': {e}"))
        })?;
        Self::new(decimal)
    }
}

/// A timestamp recording when an entity was created or last modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
