//! Property-based tests for the pure inventory rules.

use chrono::Utc;
use pizza_pantry::entities::inventory_item;
use pizza_pantry::models::input::{AdjustQuantityInput, CreateItemInput};
use pizza_pantry::models::inventory::{
    filter_items, format_quantity, stock_percentage, stock_status, total_value, StockStatus,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Non-negative decimals with up to two places.
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,30}"
}

fn category_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("dough"), Just("sauce"), Just("cheese"), Just("meat")]
}

fn item(name: String, category: &str, quantity: Decimal, cost: Decimal) -> inventory_item::Model {
    let now = Utc::now();
    inventory_item::Model {
        id: Uuid::new_v4(),
        owner_id: "user_a".into(),
        name,
        category: category.into(),
        unit: "kg".into(),
        quantity,
        reorder_threshold: Decimal::ONE,
        cost_price: cost,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn items_strategy() -> impl Strategy<Value = Vec<inventory_item::Model>> {
    prop::collection::vec(
        (name_strategy(), category_strategy(), amount_strategy(), amount_strategy())
            .prop_map(|(name, category, qty, cost)| item(name, category, qty, cost)),
        0..20,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn stock_percentage_stays_within_bounds(q in amount_strategy(), t in amount_strategy()) {
        let pct = stock_percentage(q, t);
        prop_assert!(pct >= Decimal::ZERO);
        prop_assert!(pct <= Decimal::ONE_HUNDRED);
    }

    #[test]
    fn stock_status_agrees_with_threshold(q in amount_strategy(), t in amount_strategy()) {
        let status = stock_status(q, t);
        match status {
            StockStatus::OutOfStock => prop_assert!(q.is_zero()),
            StockStatus::LowStock => prop_assert!(!q.is_zero() && q <= t),
            StockStatus::InStock => prop_assert!(q > t),
        }
    }

    #[test]
    fn filtering_only_narrows(
        items in items_strategy(),
        search in "[a-z]{0,3}",
        category in category_strategy(),
    ) {
        let filtered = filter_items(items.clone(), &search, category);
        prop_assert!(filtered.len() <= items.len());
        for kept in &filtered {
            prop_assert_eq!(kept.category.as_str(), category);
            prop_assert!(kept.name.to_lowercase().contains(&search));
        }

        let everything = filter_items(items.clone(), "", "all");
        prop_assert_eq!(everything.len(), items.len());
    }

    #[test]
    fn total_value_is_sum_of_line_values(items in items_strategy()) {
        let expected: Decimal = items.iter().map(|i| i.quantity * i.cost_price).sum();
        prop_assert_eq!(total_value(&items), expected);
        prop_assert!(total_value(&items) >= Decimal::ZERO);
    }

    #[test]
    fn formatted_quantity_ends_with_unit(
        q in amount_strategy(),
        unit in prop_oneof![Just("kg"), Just("cans"), Just("ml")],
    ) {
        let formatted = format_quantity(q, unit);
        let suffix = format!(" {}", unit);
        prop_assert!(formatted.ends_with(&suffix));
    }

    #[test]
    fn valid_items_always_pass_validation(
        name in name_strategy(),
        category in category_strategy(),
        qty in amount_strategy(),
        threshold in amount_strategy(),
        cost in amount_strategy(),
    ) {
        prop_assume!(!name.trim().is_empty());
        let input = CreateItemInput {
            name,
            category: category.to_string(),
            unit: "kg".into(),
            quantity: qty,
            reorder_threshold: threshold,
            cost_price: cost,
        };
        prop_assert!(input.into_new_item().is_ok());
    }

    #[test]
    fn negative_quantities_never_validate(cents in 1i64..10_000_000) {
        let input = CreateItemInput {
            name: "Flour".into(),
            category: "dough".into(),
            unit: "kg".into(),
            quantity: Decimal::new(-cents, 2),
            reorder_threshold: Decimal::ONE,
            cost_price: Decimal::ONE,
        };
        prop_assert!(input.into_new_item().is_err());
    }

    #[test]
    fn nonzero_changes_keep_their_sign(cents in -1_000_000i64..1_000_000) {
        prop_assume!(cents != 0);
        let adjustment = AdjustQuantityInput { change: Decimal::new(cents, 2), reason: None }
            .into_adjustment("Quantity adjustment", None)
            .unwrap();
        prop_assert_eq!(adjustment.change, Decimal::new(cents, 2));
        prop_assert_eq!(adjustment.reason.as_str(), "Quantity adjustment");
    }
}
