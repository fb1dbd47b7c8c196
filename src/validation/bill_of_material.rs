use std::collections::HashSet;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    codes, opt_within, ordered, present, within, RuleSet, Validatable, ValidationContext,
    Violations,
};
use crate::models::{BillOfMaterial, BillOfMaterialItem, BomApprovalStatus};

pub const CODE_MAX: usize = 50;
pub const NAME_MAX: usize = 200;
pub const VERSION_MAX: usize = 20;
pub const DESCRIPTION_MAX: usize = 1000;
pub const NOTES_MAX: usize = 500;

pub const ITEMS_REQUIRED: &str = "BOMItemsRequired";
pub const DUPLICATE_LINE_NUMBER: &str = "DuplicateLineNumber";
pub const COMPONENT_IS_PRODUCT: &str = "ComponentCannotBeProduct";

static ITEM_RULES: Lazy<RuleSet<BillOfMaterialItem>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "component_material_id",
            codes::REQUIRED,
            "Component material is required",
            |i: &BillOfMaterialItem, _| !i.component_material_id.is_nil(),
        )
        .rule(
            "line_number",
            codes::MUST_BE_POSITIVE,
            "Line number must be greater than 0",
            |i: &BillOfMaterialItem, _| i.line_number > 0,
        )
        .rule(
            "quantity",
            codes::MUST_BE_POSITIVE,
            "Quantity must be greater than 0",
            |i: &BillOfMaterialItem, _| i.quantity > Decimal::ZERO,
        )
        .rule(
            "scrap_factor",
            codes::OUT_OF_RANGE,
            "Scrap factor must be between 0 and 100",
            |i: &BillOfMaterialItem, _| {
                i.scrap_factor >= Decimal::ZERO && i.scrap_factor <= Decimal::ONE_HUNDRED
            },
        )
        .rule(
            "valid_to",
            codes::END_BEFORE_START,
            "Valid to date must not be before valid from date",
            |i: &BillOfMaterialItem, _| ordered(i.valid_from.as_ref(), i.valid_to.as_ref(), false),
        )
        .rule(
            "notes",
            codes::MAX_LENGTH,
            format!("Notes cannot exceed {} characters", NOTES_MAX),
            |i: &BillOfMaterialItem, _| opt_within(&i.notes, NOTES_MAX),
        )
});

static RULES: Lazy<RuleSet<BillOfMaterial>> = Lazy::new(|| {
    RuleSet::new()
        .rule("code", codes::REQUIRED, "BOM code is required", |b: &BillOfMaterial, _| {
            present(&b.code)
        })
        .rule(
            "code",
            codes::MAX_LENGTH,
            format!("BOM code cannot exceed {} characters", CODE_MAX),
            |b: &BillOfMaterial, _| within(&b.code, CODE_MAX),
        )
        .rule("name", codes::REQUIRED, "BOM name is required", |b: &BillOfMaterial, _| {
            present(&b.name)
        })
        .rule(
            "name",
            codes::MAX_LENGTH,
            format!("BOM name cannot exceed {} characters", NAME_MAX),
            |b: &BillOfMaterial, _| within(&b.name, NAME_MAX),
        )
        .rule(
            "description",
            codes::MAX_LENGTH,
            format!("Description cannot exceed {} characters", DESCRIPTION_MAX),
            |b: &BillOfMaterial, _| opt_within(&b.description, DESCRIPTION_MAX),
        )
        .rule(
            "product_material_id",
            codes::REQUIRED,
            "Product material is required",
            |b: &BillOfMaterial, _| !b.product_material_id.is_nil(),
        )
        .rule("version", codes::REQUIRED, "Version is required", |b: &BillOfMaterial, _| {
            present(&b.version)
        })
        .rule(
            "version",
            codes::MAX_LENGTH,
            format!("Version cannot exceed {} characters", VERSION_MAX),
            |b: &BillOfMaterial, _| within(&b.version, VERSION_MAX),
        )
        .rule(
            "base_quantity",
            codes::MUST_BE_POSITIVE,
            "Base quantity must be greater than 0",
            |b: &BillOfMaterial, _| b.base_quantity > Decimal::ZERO,
        )
        .rule(
            "effective_to",
            codes::END_BEFORE_START,
            "Effective to date must not be before effective from date",
            |b: &BillOfMaterial, _| {
                ordered(b.effective_from.as_ref(), b.effective_to.as_ref(), false)
            },
        )
        .rule_when(
            "items",
            ITEMS_REQUIRED,
            "An approved BOM must contain at least one item",
            |b: &BillOfMaterial, _| b.approval_status == BomApprovalStatus::Approved,
            |b: &BillOfMaterial, _| !b.items.is_empty(),
        )
        .rule(
            "items",
            DUPLICATE_LINE_NUMBER,
            "Line numbers must be unique within a BOM",
            |b: &BillOfMaterial, _| {
                let mut seen = HashSet::new();
                b.items.iter().all(|item| seen.insert(item.line_number))
            },
        )
        .rule(
            "items",
            COMPONENT_IS_PRODUCT,
            "The product material cannot be one of its own components",
            |b: &BillOfMaterial, _| !uses_component(b, b.product_material_id),
        )
});

fn uses_component(bom: &BillOfMaterial, material_id: Uuid) -> bool {
    bom.items
        .iter()
        .any(|item| item.component_material_id == material_id)
}

impl Validatable for BillOfMaterialItem {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        ITEM_RULES.evaluate(self, ctx)
    }
}

/// Header rules first, then each item under `items[i].`.
impl Validatable for BillOfMaterial {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        let mut violations = RULES.evaluate(self, ctx);
        for (index, item) in self.items.iter().enumerate() {
            violations.extend_prefixed(&format!("items[{}].", index), item.validate_with(ctx));
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentType;
    use rust_decimal_macros::dec;

    fn bom() -> BillOfMaterial {
        BillOfMaterial::new("BOM-CHAIR", "Chair", Uuid::new_v4(), "1.0", dec!(1))
    }

    fn item(line: i32, quantity: Decimal) -> BillOfMaterialItem {
        BillOfMaterialItem::new(Uuid::new_v4(), line, quantity, ComponentType::RawMaterial)
    }

    #[test]
    fn approved_bom_without_items_is_rejected() {
        let mut bom = bom();
        bom.approval_status = BomApprovalStatus::Approved;

        let violations = bom.validate_with(&ValidationContext::default());
        assert!(violations.has_rule(ITEMS_REQUIRED));
    }

    #[test]
    fn draft_bom_without_items_is_fine() {
        assert!(bom().is_valid(&ValidationContext::default()));
    }

    #[test]
    fn item_violations_carry_indexed_paths() {
        let bom = bom()
            .with_item(item(10, dec!(2)))
            .with_item(item(20, dec!(0)).with_scrap_factor(dec!(120)));

        let violations = bom.validate_with(&ValidationContext::default());
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["items[1].quantity", "items[1].scrap_factor"]);
    }

    #[test]
    fn duplicate_lines_and_self_component_are_reported() {
        let mut bom = bom().with_item(item(10, dec!(1))).with_item(item(10, dec!(1)));
        bom.items[0].component_material_id = bom.product_material_id;

        let violations = bom.validate_with(&ValidationContext::default());
        assert_eq!(violations.rules(), vec![DUPLICATE_LINE_NUMBER, COMPONENT_IS_PRODUCT]);
    }
}
