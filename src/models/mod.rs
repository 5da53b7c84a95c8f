//! Domain types shared by services and handlers.

pub mod catalog;
pub mod input;
pub mod inventory;

pub use catalog::{Category, Unit};
pub use input::{AdjustQuantityInput, CreateItemInput, UpdateItemInput};
pub use inventory::StockStatus;

use validator::ValidationErrors;

/// Order in which field errors are reported when several fields fail at once.
const FIELD_PRIORITY: &[&str] = &[
    "name",
    "category",
    "unit",
    "quantity",
    "reorder_threshold",
    "cost_price",
    "change",
    "reason",
];

/// Picks the message a client sees for a failed validation.
///
/// Field errors are ordered by [`FIELD_PRIORITY`] and then alphabetically, so
/// the same input always yields the same message.
pub fn first_validation_message(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut fields: Vec<&'static str> = field_errors.keys().copied().collect();
    fields.sort_by_key(|field| {
        let rank = FIELD_PRIORITY
            .iter()
            .position(|p| p == field)
            .unwrap_or(FIELD_PRIORITY.len());
        (rank, *field)
    });

    fields
        .into_iter()
        .find_map(|field| {
            field_errors
                .get(&field)
                .and_then(|errs| errs.first())
                .map(|err| {
                    err.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field))
                })
        })
        .unwrap_or_else(|| "Invalid input".to_string())
}
