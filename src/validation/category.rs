use once_cell::sync::Lazy;

use super::{
    codes, opt_within, present, within, RuleSet, Validatable, ValidationContext, Violations,
};
use crate::models::MaterialCategory;

pub const CODE_MAX: usize = 50;
pub const NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;

pub const CANNOT_BE_OWN_PARENT: &str = "CategoryCannotBeOwnParent";

static RULES: Lazy<RuleSet<MaterialCategory>> = Lazy::new(|| {
    RuleSet::new()
        .rule("code", codes::REQUIRED, "Category code is required", |c: &MaterialCategory, _| {
            present(&c.code)
        })
        .rule(
            "code",
            codes::MAX_LENGTH,
            format!("Category code cannot exceed {} characters", CODE_MAX),
            |c: &MaterialCategory, _| within(&c.code, CODE_MAX),
        )
        .rule("name", codes::REQUIRED, "Category name is required", |c: &MaterialCategory, _| {
            present(&c.name)
        })
        .rule(
            "name",
            codes::MAX_LENGTH,
            format!("Category name cannot exceed {} characters", NAME_MAX),
            |c: &MaterialCategory, _| within(&c.name, NAME_MAX),
        )
        .rule(
            "description",
            codes::MAX_LENGTH,
            format!("Description cannot exceed {} characters", DESCRIPTION_MAX),
            |c: &MaterialCategory, _| opt_within(&c.description, DESCRIPTION_MAX),
        )
        .rule(
            "parent_id",
            CANNOT_BE_OWN_PARENT,
            "A category cannot be its own parent",
            |c: &MaterialCategory, _| c.parent_id != Some(c.id),
        )
});

impl Validatable for MaterialCategory {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        RULES.evaluate(self, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_parent_is_rejected() {
        let mut category = MaterialCategory::new("MET", "Metals");
        category.parent_id = Some(category.id);

        let violations = category.validate_with(&ValidationContext::default());
        assert_eq!(violations.rules(), vec![CANNOT_BE_OWN_PARENT]);
    }

    #[test]
    fn blank_code_and_long_name_are_both_reported() {
        let category = MaterialCategory::new("  ", "x".repeat(NAME_MAX + 1));
        let violations = category.validate_with(&ValidationContext::default());

        assert_eq!(violations.rules(), vec![codes::REQUIRED, codes::MAX_LENGTH]);
        assert_eq!(violations.for_field("name").count(), 1);
    }
}
