use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use super::{
    codes, opt_within, ordered, present, within, RuleSet, Validatable, ValidationContext,
    Violations,
};
use crate::models::work_order::{MAX_PRIORITY, MIN_PRIORITY};
use crate::models::{WorkOrder, WorkOrderStatus};

pub const NUMBER_MAX: usize = 50;
pub const NOTES_MAX: usize = 1000;

pub const COMPLETED_PLUS_SCRAP_EXCEEDS_PLANNED: &str = "CompletedPlusScrapExceedsPlanned";

static RULES: Lazy<RuleSet<WorkOrder>> = Lazy::new(|| {
    RuleSet::new()
        .rule("number", codes::REQUIRED, "Work order number is required", |w: &WorkOrder, _| {
            present(&w.number)
        })
        .rule(
            "number",
            codes::MAX_LENGTH,
            format!("Work order number cannot exceed {} characters", NUMBER_MAX),
            |w: &WorkOrder, _| within(&w.number, NUMBER_MAX),
        )
        .rule("bom_id", codes::REQUIRED, "Bill of materials is required", |w: &WorkOrder, _| {
            !w.bom_id.is_nil()
        })
        .rule(
            "product_material_id",
            codes::REQUIRED,
            "Product material is required",
            |w: &WorkOrder, _| !w.product_material_id.is_nil(),
        )
        .rule(
            "planned_quantity",
            codes::MUST_BE_POSITIVE,
            "Planned quantity must be greater than 0",
            |w: &WorkOrder, _| w.planned_quantity > Decimal::ZERO,
        )
        .rule(
            "completed_quantity",
            codes::MUST_NOT_BE_NEGATIVE,
            "Completed quantity cannot be negative",
            |w: &WorkOrder, _| w.completed_quantity >= Decimal::ZERO,
        )
        .rule(
            "scrap_quantity",
            codes::MUST_NOT_BE_NEGATIVE,
            "Scrap quantity cannot be negative",
            |w: &WorkOrder, _| w.scrap_quantity >= Decimal::ZERO,
        )
        .rule(
            "completed_quantity",
            COMPLETED_PLUS_SCRAP_EXCEEDS_PLANNED,
            "Completed and scrap quantities together cannot exceed the planned quantity",
            |w: &WorkOrder, _| {
                w.reported_quantity().is_some_and(|reported| reported <= w.planned_quantity)
            },
        )
        .rule(
            "priority",
            codes::OUT_OF_RANGE,
            format!("Priority must be between {} and {}", MIN_PRIORITY, MAX_PRIORITY),
            |w: &WorkOrder, _| (MIN_PRIORITY..=MAX_PRIORITY).contains(&w.priority),
        )
        .rule(
            "planned_end_date",
            codes::END_BEFORE_START,
            "Planned end date must be after planned start date",
            |w: &WorkOrder, _| {
                ordered(w.planned_start_date.as_ref(), w.planned_end_date.as_ref(), true)
            },
        )
        .rule(
            "actual_end_date",
            codes::END_BEFORE_START,
            "Actual end date must be after actual start date",
            |w: &WorkOrder, _| {
                ordered(w.actual_start_date.as_ref(), w.actual_end_date.as_ref(), true)
            },
        )
        .rule(
            "completion_percentage",
            codes::OUT_OF_RANGE,
            "Completion percentage must be between 0 and 100",
            |w: &WorkOrder, _| {
                w.completion_percentage >= Decimal::ZERO
                    && w.completion_percentage <= Decimal::ONE_HUNDRED
            },
        )
        .rule_when(
            "actual_start_date",
            codes::REQUIRED,
            "Actual start date is required once production has started",
            |w: &WorkOrder, _| {
                matches!(w.status, WorkOrderStatus::InProgress | WorkOrderStatus::Completed)
            },
            |w: &WorkOrder, _| w.actual_start_date.is_some(),
        )
        .rule_when(
            "actual_end_date",
            codes::REQUIRED,
            "Actual end date is required for a completed work order",
            |w: &WorkOrder, _| w.status == WorkOrderStatus::Completed,
            |w: &WorkOrder, _| w.actual_end_date.is_some(),
        )
        .rule(
            "notes",
            codes::MAX_LENGTH,
            format!("Notes cannot exceed {} characters", NOTES_MAX),
            |w: &WorkOrder, _| opt_within(&w.notes, NOTES_MAX),
        )
});

impl Validatable for WorkOrder {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        RULES.evaluate(self, ctx)
    }
}
