//! Data models for pack allocation.
//!
//! This module defines the values exchanged with the allocator:
//! - `OrderQuantity`: a strictly positive number of ordered items
//! - `PackSizes`: the non-empty set of available pack sizes
//! - `ShipmentPlan`: how many packs of each size to ship
//!
//! It also contains the input validation that turns raw request text into
//! these types, so the allocator itself never sees invalid values.

use std::collections::{BTreeMap, BTreeSet};
use std::num::ParseIntError;

use serde::Serialize;

/// Validation error for raw order input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("invalid format for ordered items input (should be an integer value)")]
    OrderQtyInvalidFormat(#[source] ParseIntError),

    #[error("invalid value for ordered items input (should be a strictly positive integer)")]
    OrderQtyInvalidValue(i64),

    #[error("invalid format for pack sizes input (should be a list of integer values)")]
    PackSizesInvalidFormat(#[source] ParseIntError),

    #[error("invalid value for pack size (every value should be strictly positive)")]
    PackSizeInvalidValue(i64),
}

impl InputError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            InputError::OrderQtyInvalidFormat(_) => "order_qty_invalid_format",
            InputError::OrderQtyInvalidValue(_) => "order_qty_invalid_value",
            InputError::PackSizesInvalidFormat(_) => "pack_sizes_invalid_format",
            InputError::PackSizeInvalidValue(_) => "pack_size_invalid_value",
        }
    }
}

/// Largest accepted order quantity or pack size.
///
/// Matches the range of the signed integers accepted on input; with both
/// bounded by this, a shipped total always fits in a `u64`.
pub const MAX_QUANTITY: u64 = i64::MAX as u64;

fn in_range(value: u64) -> bool {
    (1..=MAX_QUANTITY).contains(&value)
}

/// Number of items requested by an order. Always in `1..=MAX_QUANTITY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderQuantity(u64);

impl OrderQuantity {
    /// Creates an order quantity, rejecting zero and values above `MAX_QUANTITY`.
    ///
    /// # Examples
    /// ```
    /// use packship::model::OrderQuantity;
    ///
    /// assert!(OrderQuantity::new(12).is_some());
    /// assert!(OrderQuantity::new(0).is_none());
    /// assert!(OrderQuantity::new(u64::MAX).is_none());
    /// ```
    pub fn new(value: u64) -> Option<Self> {
        in_range(value).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Set of available pack sizes.
///
/// Non-empty, every size is in `1..=MAX_QUANTITY` and duplicates are collapsed.
/// Iteration is ascending regardless of the order the sizes were supplied in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackSizes(BTreeSet<u64>);

impl PackSizes {
    /// Builds a pack size set from arbitrary sizes.
    ///
    /// Returns `None` if no sizes are given or any size is zero or above
    /// `MAX_QUANTITY`.
    ///
    /// # Examples
    /// ```
    /// use packship::model::PackSizes;
    ///
    /// let sizes = PackSizes::new([500, 250, 500]).unwrap();
    /// assert_eq!(sizes.len(), 2);
    /// assert_eq!(sizes.smallest(), 250);
    ///
    /// assert!(PackSizes::new([]).is_none());
    /// assert!(PackSizes::new([250, 0]).is_none());
    /// assert!(PackSizes::new([250, u64::MAX]).is_none());
    /// ```
    pub fn new(sizes: impl IntoIterator<Item = u64>) -> Option<Self> {
        let set: BTreeSet<u64> = sizes.into_iter().collect();
        if set.is_empty() || !set.iter().all(|size| in_range(*size)) {
            return None;
        }
        Some(Self(set))
    }

    /// Smallest available size.
    pub fn smallest(&self) -> u64 {
        // Constructors guarantee at least one element.
        self.0.first().copied().unwrap_or(1)
    }

    pub fn contains(&self, size: u64) -> bool {
        self.0.contains(&size)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no sizes; never true for a constructed value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sizes in ascending order.
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = u64> + '_ {
        self.0.iter().copied()
    }

    /// Sizes in descending order.
    pub fn descending(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().rev().copied()
    }
}

/// Packs to ship for one order: pack size mapped to pack count.
///
/// Only sizes with a count of at least one are present. Serializes as a JSON
/// object keyed by pack size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShipmentPlan(BTreeMap<u64, u64>);

impl ShipmentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a pack size, zero if the size is not used.
    pub fn count(&self, size: u64) -> u64 {
        self.0.get(&size).copied().unwrap_or(0)
    }

    /// Adds `packs` packs of `size`. Adding zero packs is a no-op.
    pub fn add(&mut self, size: u64, packs: u64) {
        if packs == 0 {
            return;
        }
        *self.0.entry(size).or_insert(0) += packs;
    }

    /// Removes a size entirely, returning its previous count.
    pub fn remove(&mut self, size: u64) -> u64 {
        self.0.remove(&size).unwrap_or(0)
    }

    /// `(size, count)` pairs in ascending size order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().map(|(&size, &count)| (size, count))
    }

    /// Number of distinct pack sizes used.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of items shipped.
    pub fn total_quantity(&self) -> u64 {
        self.iter().map(|(size, count)| size * count).sum()
    }

    /// Total number of packs shipped.
    pub fn total_packs(&self) -> u64 {
        self.0.values().sum()
    }
}

impl FromIterator<(u64, u64)> for ShipmentPlan {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        let mut plan = Self::new();
        for (size, count) in iter {
            plan.add(size, count);
        }
        plan
    }
}

/// Helper to parse one integer field; the caller decides which error kind
/// a failure maps to.
fn parse_integer(raw: &str) -> Result<i64, ParseIntError> {
    raw.trim().parse::<i64>()
}

/// Parses and validates the ordered item count.
///
/// # Examples
/// ```
/// use packship::model::{InputError, parse_order_quantity};
///
/// assert_eq!(parse_order_quantity("999").unwrap().get(), 999);
/// assert!(matches!(
///     parse_order_quantity("-999"),
///     Err(InputError::OrderQtyInvalidValue(-999))
/// ));
/// ```
pub fn parse_order_quantity(raw: &str) -> Result<OrderQuantity, InputError> {
    let value = parse_integer(raw).map_err(InputError::OrderQtyInvalidFormat)?;
    u64::try_from(value)
        .ok()
        .and_then(OrderQuantity::new)
        .ok_or(InputError::OrderQtyInvalidValue(value))
}

/// Parses and validates a comma-separated list of pack sizes.
///
/// Elements are checked left to right; the first invalid element decides the
/// error kind.
pub fn parse_pack_sizes(raw: &str) -> Result<PackSizes, InputError> {
    let mut sizes = BTreeSet::new();
    for part in raw.split(',') {
        let value = parse_integer(part).map_err(InputError::PackSizesInvalidFormat)?;
        let size = u64::try_from(value)
            .ok()
            .filter(|size| *size > 0)
            .ok_or(InputError::PackSizeInvalidValue(value))?;
        sizes.insert(size);
    }
    // `split` always yields at least one element, and every element was
    // checked to be positive above.
    Ok(PackSizes(sizes))
}
