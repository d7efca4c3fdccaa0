//! Pack allocation for a single order.
//!
//! The allocator decides which packs to ship so that only whole packs leave
//! the warehouse, no fewer items than ordered are shipped, and as few packs as
//! possible are used. It works in two passes:
//! - a greedy fill that takes the largest packs first and tops up any
//!   remainder with one pack of the smallest size
//! - a consolidation sweep that replaces a group of equal packs with a single
//!   pack of another available size when the quantities match exactly
//!
//! This is a bounded heuristic, not an exhaustive search. Its running time
//! depends only on the number of pack sizes, never on the order quantity.

use std::fmt;
use std::str::FromStr;

use crate::model::{OrderQuantity, PackSizes, ShipmentPlan};

/// How the consolidation sweep reads pack counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Consolidation {
    /// Counts come from the greedy fill result. A merge into a larger size
    /// is never merged again in the same sweep.
    #[default]
    SinglePass,
    /// Counts come from the plan as it is being rewritten, so chained merges
    /// (small to medium to large) happen in one sweep.
    Cascading,
}

impl Consolidation {
    pub fn as_str(self) -> &'static str {
        match self {
            Consolidation::SinglePass => "single",
            Consolidation::Cascading => "cascade",
        }
    }
}

impl fmt::Display for Consolidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a consolidation mode name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown consolidation mode '{0}' (expected 'single' or 'cascade')")]
pub struct UnknownConsolidation(String);

impl FromStr for Consolidation {
    type Err = UnknownConsolidation;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" | "single-pass" | "single_pass" => Ok(Consolidation::SinglePass),
            "cascade" | "cascading" => Ok(Consolidation::Cascading),
            other => Err(UnknownConsolidation(other.to_owned())),
        }
    }
}

/// Configuration for the allocation algorithm.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub consolidation: Consolidation,
}

impl AllocatorConfig {
    pub const DEFAULT_CONSOLIDATION: Consolidation = Consolidation::SinglePass;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> AllocatorConfigBuilder {
        AllocatorConfigBuilder::default()
    }
}

/// Builder for `AllocatorConfig`.
#[derive(Clone, Debug, Default)]
pub struct AllocatorConfigBuilder {
    config: AllocatorConfig,
}

impl AllocatorConfigBuilder {
    /// Sets the consolidation mode.
    pub fn consolidation(mut self, mode: Consolidation) -> Self {
        self.config.consolidation = mode;
        self
    }

    pub fn build(self) -> AllocatorConfig {
        self.config
    }
}

/// Computes the packs to ship for an order using the default configuration.
///
/// # Examples
/// ```
/// use packship::allocator::compute_shipment;
/// use packship::model::{OrderQuantity, PackSizes};
///
/// let sizes = PackSizes::new([250, 500, 1000, 2000, 5000]).unwrap();
/// let plan = compute_shipment(OrderQuantity::new(12_001).unwrap(), &sizes);
///
/// assert_eq!(plan.count(5000), 2);
/// assert_eq!(plan.count(2000), 1);
/// assert_eq!(plan.count(250), 1);
/// ```
pub fn compute_shipment(order: OrderQuantity, pack_sizes: &PackSizes) -> ShipmentPlan {
    compute_shipment_with_config(order, pack_sizes, AllocatorConfig::default())
}

/// Computes the packs to ship for an order.
pub fn compute_shipment_with_config(
    order: OrderQuantity,
    pack_sizes: &PackSizes,
    config: AllocatorConfig,
) -> ShipmentPlan {
    let filled = greedy_fill(order.get(), pack_sizes);
    let plan = consolidate(filled, pack_sizes, config.consolidation);
    tracing::debug!(
        order = order.get(),
        pack_sizes = pack_sizes.len(),
        shipped = plan.total_quantity(),
        packs = plan.total_packs(),
        "computed shipment"
    );
    plan
}

/// First pass: largest packs first, then one smallest pack for any remainder.
fn greedy_fill(order: u64, pack_sizes: &PackSizes) -> ShipmentPlan {
    let mut plan = ShipmentPlan::new();
    let mut remaining = order;

    for size in pack_sizes.descending() {
        if remaining == 0 {
            break;
        }
        let packs = remaining / size;
        if packs > 0 {
            plan.add(size, packs);
            remaining -= packs * size;
        }
    }

    if remaining > 0 {
        plan.add(pack_sizes.smallest(), 1);
    }

    plan
}

/// Second pass: replaces `count` packs of one size with a single pack of
/// another size when `count * size` is exactly that other size.
fn consolidate(filled: ShipmentPlan, pack_sizes: &PackSizes, mode: Consolidation) -> ShipmentPlan {
    let mut plan = filled.clone();

    for size in pack_sizes.ascending() {
        let count = match mode {
            Consolidation::SinglePass => filled.count(size),
            Consolidation::Cascading => plan.count(size),
        };
        if count == 0 {
            continue;
        }

        let Some(merged) = count.checked_mul(size) else {
            continue;
        };
        // A single pack already matches its own size.
        if merged == size || !pack_sizes.contains(merged) {
            continue;
        }

        // Packs merged into `size` earlier in the sweep stay in place.
        let current = plan.remove(size);
        plan.add(size, current.saturating_sub(count));
        plan.add(merged, 1);
    }

    plan
}
