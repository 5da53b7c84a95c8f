//! Request payloads and their validation.
//!
//! Each payload derives [`Validate`] for field rules and converts into a typed
//! value (`NewItem`, `ItemChanges`, `QuantityAdjustment`) that services accept.
//! Services never see an unvalidated payload.

use super::catalog::{Category, Unit};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::borrow::Cow;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

pub const NAME_MAX_CHARS: usize = 100;
pub const IDEMPOTENCY_KEY_MAX_CHARS: usize = 128;

/// Largest magnitude a quantity column (`DECIMAL(14,3)`) holds.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 3);
pub const QUANTITY_SCALE: u32 = 3;
/// Largest magnitude the cost column (`DECIMAL(14,2)`) holds.
pub const MAX_COST_PRICE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);
pub const COST_PRICE_SCALE: u32 = 2;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemInput {
    #[validate(custom = "validate_name")]
    #[schema(example = "Mozzarella")]
    pub name: String,
    #[validate(custom = "validate_category")]
    #[schema(example = "cheese")]
    pub category: String,
    #[validate(custom = "validate_unit")]
    #[schema(example = "kg")]
    pub unit: String,
    #[validate(custom = "validate_quantity")]
    #[schema(value_type = f64, example = 12.5)]
    pub quantity: Decimal,
    #[validate(custom = "validate_reorder_threshold")]
    #[schema(value_type = f64, example = 5)]
    pub reorder_threshold: Decimal,
    #[validate(custom = "validate_cost_price")]
    #[schema(value_type = f64, example = 8.75)]
    pub cost_price: Decimal,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemInput {
    #[validate(custom = "validate_name")]
    pub name: Option<String>,
    #[validate(custom = "validate_category")]
    pub category: Option<String>,
    #[validate(custom = "validate_unit")]
    pub unit: Option<String>,
    #[validate(custom = "validate_quantity")]
    #[schema(value_type = Option<f64>)]
    pub quantity: Option<Decimal>,
    #[validate(custom = "validate_reorder_threshold")]
    #[schema(value_type = Option<f64>)]
    pub reorder_threshold: Option<Decimal>,
    #[validate(custom = "validate_cost_price")]
    #[schema(value_type = Option<f64>)]
    pub cost_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustQuantityInput {
    #[validate(custom = "validate_change")]
    #[schema(value_type = f64, example = -3)]
    pub change: Decimal,
    #[validate(length(max = 200, message = "Reason too long"))]
    #[schema(example = "delivery")]
    pub reason: Option<String>,
}

/// A validated item ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub category: Category,
    pub unit: Unit,
    pub quantity: Decimal,
    pub reorder_threshold: Decimal,
    pub cost_price: Decimal,
}

/// A validated partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub unit: Option<Unit>,
    pub quantity: Option<Decimal>,
    pub reorder_threshold: Option<Decimal>,
    pub cost_price: Option<Decimal>,
}

/// A validated ledger request.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityAdjustment {
    pub change: Decimal,
    pub reason: String,
    pub idempotency_key: Option<String>,
}

impl CreateItemInput {
    pub fn into_new_item(self) -> Result<NewItem, ValidationErrors> {
        self.validate()?;
        Ok(NewItem {
            name: self.name.trim().to_string(),
            category: parse_category(&self.category)?,
            unit: parse_unit(&self.unit)?,
            quantity: self.quantity,
            reorder_threshold: self.reorder_threshold,
            cost_price: self.cost_price,
        })
    }
}

impl UpdateItemInput {
    pub fn into_changes(self) -> Result<ItemChanges, ValidationErrors> {
        self.validate()?;
        Ok(ItemChanges {
            name: self.name.map(|n| n.trim().to_string()),
            category: self.category.as_deref().map(parse_category).transpose()?,
            unit: self.unit.as_deref().map(parse_unit).transpose()?,
            quantity: self.quantity,
            reorder_threshold: self.reorder_threshold,
            cost_price: self.cost_price,
        })
    }
}

impl AdjustQuantityInput {
    /// Validates the payload and fills in `default_reason` when no usable reason was given.
    pub fn into_adjustment(
        self,
        default_reason: &str,
        idempotency_key: Option<String>,
    ) -> Result<QuantityAdjustment, ValidationErrors> {
        self.validate()?;

        let idempotency_key = idempotency_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Some(key) = &idempotency_key {
            if key.chars().count() > IDEMPOTENCY_KEY_MAX_CHARS {
                let mut errors = ValidationErrors::new();
                errors.add(
                    "idempotency_key",
                    field_error("idempotency_key", "Idempotency key too long"),
                );
                return Err(errors);
            }
        }

        let reason = self
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_reason.to_string());

        Ok(QuantityAdjustment {
            change: self.change,
            reason,
            idempotency_key,
        })
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn single_field_errors(field: &'static str, err: ValidationError) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(field, err);
    errors
}

fn parse_category(value: &str) -> Result<Category, ValidationErrors> {
    Category::from_str(value.trim())
        .map_err(|_| single_field_errors("category", field_error("category", "Invalid category")))
}

fn parse_unit(value: &str) -> Result<Unit, ValidationErrors> {
    Unit::from_str(value.trim())
        .map_err(|_| single_field_errors("unit", field_error("unit", "Invalid unit")))
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(field_error("name", "Name is required"));
    }
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(field_error("name", "Name too long"));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(field_error("category", "Category is required"));
    }
    Category::from_str(trimmed)
        .map(|_| ())
        .map_err(|_| field_error("category", "Invalid category"))
}

fn validate_unit(unit: &str) -> Result<(), ValidationError> {
    let trimmed = unit.trim();
    if trimmed.is_empty() {
        return Err(field_error("unit", "Unit is required"));
    }
    Unit::from_str(trimmed)
        .map(|_| ())
        .map_err(|_| field_error("unit", "Invalid unit"))
}

fn validate_quantity(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value, "quantity", "Quantity cannot be negative")?;
    fits_column(
        value,
        ColumnLimit::QUANTITY,
        "quantity",
        "Quantity too large",
        "Quantity allows at most 3 decimal places",
    )
}

fn validate_reorder_threshold(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value, "reorder_threshold", "Reorder threshold cannot be negative")?;
    fits_column(
        value,
        ColumnLimit::QUANTITY,
        "reorder_threshold",
        "Reorder threshold too large",
        "Reorder threshold allows at most 3 decimal places",
    )
}

fn validate_cost_price(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value, "cost_price", "Cost price cannot be negative")?;
    fits_column(
        value,
        ColumnLimit::COST_PRICE,
        "cost_price",
        "Cost price too large",
        "Cost price allows at most 2 decimal places",
    )
}

fn non_negative(
    value: &Decimal,
    code: &'static str,
    message: &'static str,
) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        Err(field_error(code, message))
    } else {
        Ok(())
    }
}

/// Precision of a stored decimal column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnLimit {
    pub max: Decimal,
    pub scale: u32,
}

impl ColumnLimit {
    pub const QUANTITY: ColumnLimit = ColumnLimit {
        max: MAX_QUANTITY,
        scale: QUANTITY_SCALE,
    };
    pub const COST_PRICE: ColumnLimit = ColumnLimit {
        max: MAX_COST_PRICE,
        scale: COST_PRICE_SCALE,
    };

    /// True when `value` is stored without rounding or overflow.
    pub fn admits(&self, value: Decimal) -> bool {
        value.abs() <= self.max && value.normalize().scale() <= self.scale
    }
}

fn fits_column(
    value: &Decimal,
    limit: ColumnLimit,
    code: &'static str,
    too_large: &'static str,
    too_precise: &'static str,
) -> Result<(), ValidationError> {
    if value.abs() > limit.max {
        Err(field_error(code, too_large))
    } else if value.normalize().scale() > limit.scale {
        Err(field_error(code, too_precise))
    } else {
        Ok(())
    }
}

fn validate_change(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(field_error("change", "Change cannot be zero"));
    }
    fits_column(
        value,
        ColumnLimit::QUANTITY,
        "change",
        "Change too large",
        "Change allows at most 3 decimal places",
    )
}
