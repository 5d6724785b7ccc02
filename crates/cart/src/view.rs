//! Derived display views over the flat line list.
//!
//! Groupings are recomputed from scratch on every call - there is no
//! cached intermediate state, so group membership can never go stale
//! after a removal.

use std::collections::{HashMap, HashSet};

use tidepool_core::{Price, ProductId, VariantId};

use crate::types::{CartLineItem, Totals};

/// One product's line items bundled for display.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedProduct {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// This product's lines, in the order they were encountered.
    pub lines: Vec<CartLineItem>,
    pub total_quantity: u32,
    pub total_price: Price,
}

/// Group lines by product for display.
///
/// Groups appear in the order their product was first encountered, and
/// lines keep their order within a group. Lines with no product info
/// cannot be grouped or displayed and are skipped.
#[must_use]
pub fn group_by_product(items: &[CartLineItem]) -> Vec<GroupedProduct> {
    let mut groups: Vec<GroupedProduct> = Vec::new();
    let mut index: HashMap<ProductId, usize> = HashMap::new();

    for item in items {
        let Some(product) = item.snapshot.product.as_ref() else {
            continue;
        };
        let line_total = item.snapshot.price * item.quantity;

        if let Some(at) = index.get(&product.id) {
            let Some(group) = groups.get_mut(*at) else {
                continue;
            };
            group.lines.push(item.clone());
            group.total_quantity += item.quantity;
            group.total_price = group.total_price + line_total;
        } else {
            index.insert(product.id.clone(), groups.len());
            groups.push(GroupedProduct {
                product_id: product.id.clone(),
                name: product.name.clone(),
                image: product.image.clone(),
                lines: vec![item.clone()],
                total_quantity: item.quantity,
                total_price: line_total,
            });
        }
    }

    groups
}

/// Totals across the lines the presentation layer marked selected
/// (partial checkout).
#[must_use]
pub fn selection_totals(items: &[CartLineItem], selected: &HashSet<VariantId>) -> Totals {
    Totals::of_lines(items.iter().filter(|item| selected.contains(&item.variant_id)))
}
