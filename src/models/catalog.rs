use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use utoipa::ToSchema;

/// Recognised item categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Dough,
    Sauce,
    Cheese,
    Meat,
    Vegetables,
    Toppings,
    Drinks,
    Supplies,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Dough => "Dough & Base",
            Category::Sauce => "Sauces",
            Category::Cheese => "Cheese",
            Category::Meat => "Meat",
            Category::Vegetables => "Vegetables",
            Category::Toppings => "Toppings",
            Category::Drinks => "Drinks",
            Category::Supplies => "Supplies",
        }
    }
}

/// Recognised units of measure. Serialized exactly as users type them,
/// including the capital `L` for litres.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum Unit {
    #[serde(rename = "kg")]
    #[strum(serialize = "kg")]
    Kilogram,
    #[serde(rename = "g")]
    #[strum(serialize = "g")]
    Gram,
    #[serde(rename = "lb")]
    #[strum(serialize = "lb")]
    Pound,
    #[serde(rename = "oz")]
    #[strum(serialize = "oz")]
    Ounce,
    #[serde(rename = "L")]
    #[strum(serialize = "L")]
    Litre,
    #[serde(rename = "ml")]
    #[strum(serialize = "ml")]
    Millilitre,
    #[serde(rename = "pieces")]
    #[strum(serialize = "pieces")]
    Pieces,
    #[serde(rename = "packages")]
    #[strum(serialize = "packages")]
    Packages,
    #[serde(rename = "cans")]
    #[strum(serialize = "cans")]
    Cans,
}

impl Unit {
    /// Decimal places used when displaying a quantity in this unit.
    pub fn display_precision(&self) -> u32 {
        match self {
            Unit::Pieces | Unit::Packages | Unit::Cans => 0,
            Unit::Kilogram | Unit::Pound | Unit::Litre => 1,
            Unit::Gram | Unit::Millilitre | Unit::Ounce => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryOption {
    pub value: Category,
    pub label: &'static str,
}

/// Categories and units offered to clients building item forms.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Catalog {
    pub categories: Vec<CategoryOption>,
    pub units: Vec<Unit>,
}

impl Catalog {
    pub fn build() -> Self {
        Self {
            categories: Category::iter()
                .map(|value| CategoryOption {
                    value,
                    label: value.label(),
                })
                .collect(),
            units: Unit::iter().collect(),
        }
    }
}
