use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use super::{
    codes, opt_non_negative, opt_within, present, within, RuleSet, Validatable, ValidationContext,
    Violations,
};
use crate::models::Material;

pub const CODE_MAX: usize = 50;
pub const NAME_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 1000;
pub const UNIT_MAX: usize = 20;

pub const MIN_STOCK_EXCEEDS_MAX: &str = "MinStockLevelExceedsMaxStockLevel";
pub const REORDER_EXCEEDS_MAX: &str = "ReorderLevelExceedsMaxStockLevel";

static RULES: Lazy<RuleSet<Material>> = Lazy::new(|| {
    RuleSet::new()
        .rule("code", codes::REQUIRED, "Material code is required", |m: &Material, _| {
            present(&m.code)
        })
        .rule(
            "code",
            codes::MAX_LENGTH,
            format!("Material code cannot exceed {} characters", CODE_MAX),
            |m: &Material, _| within(&m.code, CODE_MAX),
        )
        .rule("name", codes::REQUIRED, "Material name is required", |m: &Material, _| {
            present(&m.name)
        })
        .rule(
            "name",
            codes::MAX_LENGTH,
            format!("Material name cannot exceed {} characters", NAME_MAX),
            |m: &Material, _| within(&m.name, NAME_MAX),
        )
        .rule(
            "description",
            codes::MAX_LENGTH,
            format!("Description cannot exceed {} characters", DESCRIPTION_MAX),
            |m: &Material, _| opt_within(&m.description, DESCRIPTION_MAX),
        )
        .rule(
            "unit_of_measure",
            codes::REQUIRED,
            "Unit of measure is required",
            |m: &Material, _| present(&m.unit_of_measure),
        )
        .rule(
            "unit_of_measure",
            codes::MAX_LENGTH,
            format!("Unit of measure cannot exceed {} characters", UNIT_MAX),
            |m: &Material, _| within(&m.unit_of_measure, UNIT_MAX),
        )
        .rule(
            "purchase_price",
            codes::MUST_NOT_BE_NEGATIVE,
            "Purchase price cannot be negative",
            |m: &Material, _| m.purchase_price >= Decimal::ZERO,
        )
        .rule(
            "sales_price",
            codes::MUST_NOT_BE_NEGATIVE,
            "Sales price cannot be negative",
            |m: &Material, _| m.sales_price >= Decimal::ZERO,
        )
        .rule(
            "min_stock_level",
            codes::MUST_NOT_BE_NEGATIVE,
            "Minimum stock level cannot be negative",
            |m: &Material, _| m.min_stock_level >= Decimal::ZERO,
        )
        .rule(
            "max_stock_level",
            codes::MUST_NOT_BE_NEGATIVE,
            "Maximum stock level cannot be negative",
            |m: &Material, _| opt_non_negative(m.max_stock_level),
        )
        .rule(
            "reorder_level",
            codes::MUST_NOT_BE_NEGATIVE,
            "Reorder level cannot be negative",
            |m: &Material, _| m.reorder_level >= Decimal::ZERO,
        )
        .rule(
            "min_stock_level",
            MIN_STOCK_EXCEEDS_MAX,
            "Minimum stock level cannot exceed maximum stock level",
            |m: &Material, _| m.max_stock_level.map_or(true, |max| m.min_stock_level <= max),
        )
        .rule(
            "reorder_level",
            REORDER_EXCEEDS_MAX,
            "Reorder level cannot exceed maximum stock level",
            |m: &Material, _| m.max_stock_level.map_or(true, |max| m.reorder_level <= max),
        )
        .rule(
            "weight",
            codes::MUST_NOT_BE_NEGATIVE,
            "Weight cannot be negative",
            |m: &Material, _| opt_non_negative(m.weight),
        )
        .rule(
            "width",
            codes::MUST_NOT_BE_NEGATIVE,
            "Width cannot be negative",
            |m: &Material, _| opt_non_negative(m.width),
        )
        .rule(
            "height",
            codes::MUST_NOT_BE_NEGATIVE,
            "Height cannot be negative",
            |m: &Material, _| opt_non_negative(m.height),
        )
        .rule(
            "length",
            codes::MUST_NOT_BE_NEGATIVE,
            "Length cannot be negative",
            |m: &Material, _| opt_non_negative(m.length),
        )
});

impl Validatable for Material {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        RULES.evaluate(self, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaterialType;
    use rust_decimal_macros::dec;

    fn steel() -> Material {
        Material::new("RM-STEEL", "Steel sheet", MaterialType::RawMaterial, "KG")
    }

    #[test]
    fn valid_material_passes() {
        let mut material = steel();
        material.purchase_price = dec!(12.50);
        material.min_stock_level = dec!(10);
        material.max_stock_level = Some(dec!(100));
        material.reorder_level = dec!(20);
        assert!(material.is_valid(&ValidationContext::default()));
    }

    #[test]
    fn stock_thresholds_are_cross_checked_against_max() {
        let mut material = steel();
        material.min_stock_level = dec!(50);
        material.reorder_level = dec!(60);
        material.max_stock_level = Some(dec!(40));

        let violations = material.validate_with(&ValidationContext::default());
        assert_eq!(violations.rules(), vec![MIN_STOCK_EXCEEDS_MAX, REORDER_EXCEEDS_MAX]);
    }

    #[test]
    fn negative_dimensions_are_reported_per_field() {
        let mut material = steel();
        material.weight = Some(dec!(-1));
        material.length = Some(dec!(-0.5));
        material.sales_price = dec!(-3);

        let violations = material.validate_with(&ValidationContext::default());
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["sales_price", "weight", "length"]);
    }
}
