//! Derived views over inventory items: stock status, filtering, sorting and
//! valuation. Pure functions; nothing here touches the database.

use crate::entities::inventory_item;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;

use super::catalog::Unit;

const DEFAULT_DISPLAY_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

/// Empty stock wins over the threshold check, so an item with a zero
/// threshold and zero quantity is out of stock rather than low.
pub fn stock_status(quantity: Decimal, reorder_threshold: Decimal) -> StockStatus {
    if quantity.is_zero() {
        StockStatus::OutOfStock
    } else if quantity <= reorder_threshold {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// How full the shelf is, as a percentage of twice the reorder threshold
/// (or of the quantity itself when it already exceeds that).
pub fn stock_percentage(quantity: Decimal, reorder_threshold: Decimal) -> Decimal {
    let max_quantity = quantity.max(reorder_threshold.saturating_mul(Decimal::TWO));
    if max_quantity.is_zero() {
        return Decimal::ZERO;
    }
    (quantity / max_quantity * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED)
}

/// Client-selectable orderings for item lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema, EnumString, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortKey {
    Name,
    Quantity,
    QuantityDesc,
    Category,
    Cost,
    CostDesc,
    /// Most recently updated first.
    Updated,
}

pub fn sort_items(items: &mut [inventory_item::Model], key: SortKey) {
    items.sort_by(|a, b| compare(a, b, key));
}

fn compare(a: &inventory_item::Model, b: &inventory_item::Model, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        SortKey::Quantity => a.quantity.cmp(&b.quantity),
        SortKey::QuantityDesc => b.quantity.cmp(&a.quantity),
        SortKey::Category => a.category.cmp(&b.category),
        SortKey::Cost => a.cost_price.cmp(&b.cost_price),
        SortKey::CostDesc => b.cost_price.cmp(&a.cost_price),
        SortKey::Updated => b.updated_at.cmp(&a.updated_at),
    }
}

/// Keeps items whose name contains `search` (case-insensitive) and whose
/// category equals `category`. An empty search and the category `all` match
/// everything.
pub fn filter_items(
    items: Vec<inventory_item::Model>,
    search: &str,
    category: &str,
) -> Vec<inventory_item::Model> {
    let needle = search.trim().to_lowercase();
    items
        .into_iter()
        .filter(|item| needle.is_empty() || item.name.to_lowercase().contains(&needle))
        .filter(|item| category == "all" || category.is_empty() || item.category == category)
        .collect()
}

/// Sum of quantity times cost. Saturates at `Decimal::MAX` instead of panicking.
pub fn total_value(items: &[inventory_item::Model]) -> Decimal {
    items.iter().fold(Decimal::ZERO, |acc, item| {
        acc.saturating_add(item.quantity.saturating_mul(item.cost_price))
    })
}

/// Items at or below their reorder threshold, out-of-stock ones included.
pub fn low_stock_items(items: &[inventory_item::Model]) -> Vec<&inventory_item::Model> {
    items
        .iter()
        .filter(|item| item.quantity <= item.reorder_threshold)
        .collect()
}

/// Renders `quantity` with the precision conventional for `unit` and
/// thousands separators, e.g. `1,250.5 kg` or `12 cans`.
pub fn format_quantity(quantity: Decimal, unit: &str) -> String {
    let precision = match Unit::from_str(unit) {
        Ok(known) => known.display_precision(),
        // legacy count units that predate the unit list
        Err(_) if matches!(unit, "boxes" | "units") => 0,
        Err(_) => DEFAULT_DISPLAY_PRECISION,
    };
    format!("{} {}", format_number(quantity, precision), unit)
}

fn format_number(value: Decimal, precision: u32) -> String {
    let rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.*}", precision as usize, rounded);

    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// An item as returned by the API, with its derived stock fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    #[serde(flatten)]
    pub item: inventory_item::Model,
    pub stock_status: StockStatus,
    #[schema(value_type = String, example = "50")]
    pub stock_percentage: Decimal,
    #[schema(example = "12.5 kg")]
    pub formatted_quantity: String,
}

impl From<inventory_item::Model> for ItemView {
    fn from(item: inventory_item::Model) -> Self {
        Self {
            stock_status: stock_status(item.quantity, item.reorder_threshold),
            stock_percentage: stock_percentage(item.quantity, item.reorder_threshold)
                .round_dp(1),
            formatted_quantity: format_quantity(item.quantity, &item.unit),
            item,
        }
    }
}

/// Dashboard figures for one owner's inventory.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_items: usize,
    #[schema(value_type = String, example = "1520.75")]
    pub total_value: Decimal,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub low_stock_items: Vec<ItemView>,
}

impl InventorySummary {
    pub fn from_items(items: &[inventory_item::Model]) -> Self {
        let low: Vec<ItemView> = low_stock_items(items)
            .into_iter()
            .cloned()
            .map(ItemView::from)
            .collect();
        Self {
            total_items: items.len(),
            total_value: total_value(items).round_dp(2),
            low_stock_count: low.len(),
            out_of_stock_count: items.iter().filter(|i| i.quantity.is_zero()).count(),
            low_stock_items: low,
        }
    }
}
