//! Backend-independent helpers for assembling stored rows into domain types.
use duka_common::Money;
use log::*;

use crate::db_types::OrderLineItem;

/// The flat product columns carried by orders written before line-item support existed.
#[derive(Debug, Clone, Default)]
pub struct LegacyLineColumns {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Option<i64>,
    pub subtotal: Money,
}

/// Rebuilds an order's line items from whatever representation the row holds, in order of preference:
/// 1. a JSON array of line items,
/// 2. a JSON string that itself holds such an array (double-encoded by older writers),
/// 3. a single line item synthesized from the legacy flat columns.
///
/// Returns an empty list if none of these yield anything.
pub fn reconstruct_line_items(raw_items: Option<&str>, legacy: LegacyLineColumns) -> Vec<OrderLineItem> {
    if let Some(items) = raw_items.and_then(parse_line_items) {
        if !items.is_empty() {
            return items;
        }
    }
    synthesize_line_item(legacy).into_iter().collect()
}

fn parse_line_items(raw: &str) -> Option<Vec<OrderLineItem>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Vec<OrderLineItem>>(raw) {
        Ok(items) => Some(items),
        Err(_) => {
            let inner = serde_json::from_str::<String>(raw).ok()?;
            let items = serde_json::from_str::<Vec<OrderLineItem>>(&inner);
            if let Err(e) = &items {
                warn!("🗃️ Stored line items could not be parsed: {e}. Falling back to legacy columns.");
            }
            items.ok()
        },
    }
}

fn synthesize_line_item(legacy: LegacyLineColumns) -> Option<OrderLineItem> {
    let product_id = legacy.product_id.filter(|s| !s.trim().is_empty())?;
    let quantity = u32::try_from(legacy.quantity.unwrap_or(1)).unwrap_or(1).max(1);
    let unit_price = Money::from_cents(legacy.subtotal.cents() / i64::from(quantity));
    Some(OrderLineItem {
        product_name: legacy.product_name.unwrap_or_else(|| product_id.clone()),
        product_id,
        quantity,
        paid_quantity: quantity,
        free_quantity: 0,
        unit_price,
        original_unit_price: unit_price,
        subtotal: legacy.subtotal,
        size: None,
        color: None,
    })
}

/// The flat product columns to write when only the legacy schema is available. Multi-line orders collapse onto the
/// first product, with the total quantity.
pub fn legacy_columns_for(items: &[OrderLineItem], subtotal: Money) -> LegacyLineColumns {
    let first = items.first();
    LegacyLineColumns {
        product_id: first.map(|i| i.product_id.clone()),
        product_name: first.map(|i| i.product_name.clone()),
        quantity: Some(items.iter().map(|i| i64::from(i.quantity)).sum()),
        subtotal,
    }
}
