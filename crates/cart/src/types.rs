//! Cart domain types.
//!
//! The flat line-item list is the canonical representation; everything
//! the presentation layer shows (counts, totals, per-product groups) is
//! derived from it. Serde names stay camelCase for compatibility with
//! the historical local-storage payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidepool_core::{Price, ProductId, VariantId};

/// One shopper-intent entry: a purchasable variant, how many of it, and
/// the display data captured when it was first added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Unique key within a cart.
    pub variant_id: VariantId,
    /// Always >= 1; quantity zero is represented only by removal.
    pub quantity: u32,
    /// Display snapshot captured at add-time. Not a live pricing source.
    #[serde(rename = "productSnapshot")]
    pub snapshot: ProductSnapshot,
    /// First-insertion time, preserved across quantity updates.
    pub added_at: DateTime<Utc>,
}

/// Denormalized display data embedded in a line item.
///
/// May go stale relative to the catalog; the cart never re-validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Owning product, when the catalog supplied one. Lines without it
    /// cannot be grouped for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductInfo>,
    /// Variant price at add-time.
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Stock ceiling at add-time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
}

/// Product display data within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The aggregate cart root, owned exclusively by the store.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    /// Insertion order is display order.
    pub items: Vec<CartLineItem>,
    /// True while a remote-path request is in flight.
    pub loading: bool,
    /// Last operation failure, cleared on the next successful operation.
    pub error: Option<String>,
}

/// Aggregates over a set of lines: total units, distinct lines, and the
/// summed monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub units: u32,
    pub lines: usize,
    pub amount: Price,
}

impl Totals {
    /// Compute aggregates over a full line list.
    #[must_use]
    pub fn of(items: &[CartLineItem]) -> Self {
        Self::of_lines(items.iter())
    }

    /// Compute aggregates over any subset of lines.
    ///
    /// The first line's currency wins; mixed-currency carts are not
    /// modeled.
    pub fn of_lines<'a>(lines: impl Iterator<Item = &'a CartLineItem>) -> Self {
        let mut totals = Self::default();
        for line in lines {
            let line_total = line.snapshot.price * line.quantity;
            totals.amount = if totals.lines == 0 {
                line_total
            } else {
                totals.amount + line_total
            };
            totals.units += line.quantity;
            totals.lines += 1;
        }
        totals
    }
}
