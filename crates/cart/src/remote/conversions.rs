//! Wire-shape normalization for the remote cart service.
//!
//! The service returns line items with nested variant → product data;
//! the cart flattens each into a [`CartLineItem`] with a display
//! snapshot. Lines the cart cannot represent are skipped, not fatal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tidepool_core::{CurrencyCode, Price, ProductId, VariantId};
use tracing::warn;

use crate::types::{CartLineItem, ProductInfo, ProductSnapshot};

/// Server-shaped cart payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCart {
    #[serde(default)]
    pub items: Vec<WireCartItem>,
}

/// Server-shaped line item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireCartItem {
    pub quantity: u32,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    pub variant: WireVariant,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVariant {
    pub id: VariantId,
    /// Decimal string, e.g. `"19.99"`.
    pub price: String,
    #[serde(default)]
    pub currency_code: CurrencyCode,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub product: Option<WireProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireImage {
    pub url: String,
    /// Set when the image belongs to one specific variant.
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

/// Normalize a full server cart into line items, skipping lines the
/// cart cannot represent.
pub(crate) fn convert_cart(cart: WireCart) -> Vec<CartLineItem> {
    cart.items.into_iter().filter_map(convert_item).collect()
}

/// Flatten one server line into a [`CartLineItem`].
///
/// Returns `None` (with a warning) for lines with a zero quantity or an
/// unparseable price.
pub(crate) fn convert_item(item: WireCartItem) -> Option<CartLineItem> {
    if item.quantity == 0 {
        warn!(variant = %item.variant.id, "skipping remote line with zero quantity");
        return None;
    }

    let amount = match item.variant.price.parse::<Decimal>() {
        Ok(amount) => amount,
        Err(err) => {
            warn!(variant = %item.variant.id, %err, "skipping remote line with unparseable price");
            return None;
        }
    };

    let image = pick_image(&item.variant);
    let snapshot = ProductSnapshot {
        product: item.variant.product.map(|product| ProductInfo {
            id: product.id,
            name: product.name,
            image,
        }),
        price: Price::new(amount, item.variant.currency_code),
        size: item.variant.size,
        color: item.variant.color,
        stock: item.variant.stock,
    };

    Some(CartLineItem {
        variant_id: item.variant.id,
        quantity: item.quantity,
        snapshot,
        added_at: item.added_at.unwrap_or_else(Utc::now),
    })
}

/// Pick the display image: prefer an image tagged with the matching
/// variant, fall back to the first catalog image.
fn pick_image(variant: &WireVariant) -> Option<String> {
    let images = &variant.product.as_ref()?.images;
    images
        .iter()
        .find(|image| image.variant_id.as_ref() == Some(&variant.id))
        .or_else(|| images.first())
        .map(|image| image.url.clone())
}
