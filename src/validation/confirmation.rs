use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use super::{
    codes, opt_non_negative, opt_within, present, within, RuleSet, Validatable, ValidationContext,
    Violations,
};
use crate::models::{ConfirmationStatus, ProductionConfirmation, QualityStatus};

pub const NUMBER_MAX: usize = 50;
pub const NOTES_MAX: usize = 1000;

pub const TOTAL_QUANTITY_MUST_BE_POSITIVE: &str = "TotalQuantityMustBeGreaterThanZero";
pub const DATE_IN_FUTURE: &str = "ConfirmationDateCannotBeInFuture";

fn is_confirmed(c: &ProductionConfirmation, _: &ValidationContext) -> bool {
    c.status == ConfirmationStatus::Confirmed
}

static RULES: Lazy<RuleSet<ProductionConfirmation>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "number",
            codes::REQUIRED,
            "Confirmation number is required",
            |c: &ProductionConfirmation, _| present(&c.number),
        )
        .rule(
            "number",
            codes::MAX_LENGTH,
            format!("Confirmation number cannot exceed {} characters", NUMBER_MAX),
            |c: &ProductionConfirmation, _| within(&c.number, NUMBER_MAX),
        )
        .rule(
            "work_order_id",
            codes::REQUIRED,
            "Work order is required",
            |c: &ProductionConfirmation, _| !c.work_order_id.is_nil(),
        )
        .rule(
            "confirmation_date",
            DATE_IN_FUTURE,
            "Confirmation date cannot be in the future",
            |c: &ProductionConfirmation, ctx: &ValidationContext| {
                ctx.now
                    .checked_add_signed(ctx.confirmation_date_tolerance)
                    .map_or(true, |limit| c.confirmation_date <= limit)
            },
        )
        .rule(
            "confirmed_quantity",
            codes::MUST_NOT_BE_NEGATIVE,
            "Confirmed quantity cannot be negative",
            |c: &ProductionConfirmation, _| c.confirmed_quantity >= Decimal::ZERO,
        )
        .rule(
            "scrap_quantity",
            codes::MUST_NOT_BE_NEGATIVE,
            "Scrap quantity cannot be negative",
            |c: &ProductionConfirmation, _| c.scrap_quantity >= Decimal::ZERO,
        )
        .rule(
            "rework_quantity",
            codes::MUST_NOT_BE_NEGATIVE,
            "Rework quantity cannot be negative",
            |c: &ProductionConfirmation, _| c.rework_quantity >= Decimal::ZERO,
        )
        .rule(
            "total_quantity",
            TOTAL_QUANTITY_MUST_BE_POSITIVE,
            "Confirmed, scrap and rework quantities must total more than 0 and stay in range",
            |c: &ProductionConfirmation, _| {
                c.checked_total_quantity().is_some_and(|total| total > Decimal::ZERO)
            },
        )
        .rule(
            "setup_time",
            codes::MUST_NOT_BE_NEGATIVE,
            "Setup time cannot be negative",
            |c: &ProductionConfirmation, _| opt_non_negative(c.setup_time),
        )
        .rule(
            "run_time",
            codes::MUST_NOT_BE_NEGATIVE,
            "Run time cannot be negative",
            |c: &ProductionConfirmation, _| opt_non_negative(c.run_time),
        )
        .rule(
            "down_time",
            codes::MUST_NOT_BE_NEGATIVE,
            "Down time cannot be negative",
            |c: &ProductionConfirmation, _| opt_non_negative(c.down_time),
        )
        .rule_when(
            "operator_user_id",
            codes::REQUIRED,
            "Operator is required for a confirmed confirmation",
            is_confirmed,
            |c: &ProductionConfirmation, _| c.operator_user_id.is_some(),
        )
        .rule_when(
            "confirmed_by_user_id",
            codes::REQUIRED,
            "Confirming user is required for a confirmed confirmation",
            is_confirmed,
            |c: &ProductionConfirmation, _| c.confirmed_by_user_id.is_some(),
        )
        .rule_when(
            "confirmed_date",
            codes::REQUIRED,
            "Confirmed date is required for a confirmed confirmation",
            is_confirmed,
            |c: &ProductionConfirmation, _| c.confirmed_date.is_some(),
        )
        .rule_when(
            "quality_notes",
            codes::REQUIRED,
            "Quality notes are required when quality check failed",
            |c: &ProductionConfirmation, _| c.quality_status == QualityStatus::Failed,
            |c: &ProductionConfirmation, _| c.quality_notes.as_deref().map_or(false, present),
        )
        .rule(
            "quality_notes",
            codes::MAX_LENGTH,
            format!("Quality notes cannot exceed {} characters", NOTES_MAX),
            |c: &ProductionConfirmation, _| opt_within(&c.quality_notes, NOTES_MAX),
        )
        .rule(
            "notes",
            codes::MAX_LENGTH,
            format!("Notes cannot exceed {} characters", NOTES_MAX),
            |c: &ProductionConfirmation, _| opt_within(&c.notes, NOTES_MAX),
        )
});

impl Validatable for ProductionConfirmation {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        RULES.evaluate(self, ctx)
    }
}
