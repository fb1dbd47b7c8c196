//! Status transition guards.
//!
//! A guard answers two questions about a requested status change: is the
//! edge in the status graph, and which fields must be filled before the
//! record may enter the target status. Guards are pure; failures become
//! [`Violations`] for the caller to report.

use std::fmt::Debug;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{
    BillOfMaterial, BomApprovalStatus, ConfirmationStatus, ProductionConfirmation, WorkOrder,
    WorkOrderStatus,
};
use crate::validation::{bill_of_material::ITEMS_REQUIRED, codes, Violation, Violations};

/// Outcome of a transition request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionCheck {
    pub from: String,
    pub to: String,
    pub allowed: bool,
    /// Fields that must be set before entering `to`.
    pub missing_fields: Vec<&'static str>,
    /// Graph or precondition failures.
    pub blockers: Vec<Violation>,
}

impl TransitionCheck {
    pub fn is_permitted(&self) -> bool {
        self.allowed
    }

    pub fn into_violations(self) -> Violations {
        let mut violations = Violations::from(self.blockers);
        for field in self.missing_fields {
            violations.push(Violation::new(
                field,
                codes::REQUIRED,
                format!("{} is required to enter status {}", field, self.to),
            ));
        }
        violations
    }

    pub fn into_result(self) -> Result<(), Violations> {
        self.into_violations().into_result()
    }
}

/// Records with a closed status graph.
pub trait StatusLifecycle {
    type Status: Copy + PartialEq + AsRef<str> + Debug + 'static;

    fn status(&self) -> Self::Status;

    /// Statuses reachable in one step from `from`.
    fn targets(from: Self::Status) -> &'static [Self::Status];

    /// Fields required on entry to `target` that are not set.
    fn missing_for(&self, target: Self::Status) -> Vec<&'static str>;

    /// Precondition failures for entering `target`, beyond required fields.
    fn preconditions(&self, _target: Self::Status) -> Vec<Violation> {
        Vec::new()
    }
}

pub fn can_transition<E: StatusLifecycle>(entity: &E, target: E::Status) -> TransitionCheck {
    let from = entity.status();
    let mut blockers = Vec::new();

    if !E::targets(from).contains(&target) {
        blockers.push(Violation::new(
            "status",
            codes::INVALID_STATUS_TRANSITION,
            format!(
                "Cannot change status from {} to {}",
                from.as_ref(),
                target.as_ref()
            ),
        ));
    } else {
        blockers.extend(entity.preconditions(target));
    }

    let missing_fields = entity.missing_for(target);
    TransitionCheck {
        from: from.as_ref().to_string(),
        to: target.as_ref().to_string(),
        allowed: blockers.is_empty() && missing_fields.is_empty(),
        missing_fields,
        blockers,
    }
}

fn missing(checks: &[(&'static str, bool)]) -> Vec<&'static str> {
    checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(field, _)| *field)
        .collect()
}

impl WorkOrder {
    pub fn can_start(&self) -> bool {
        self.status == WorkOrderStatus::Released
    }

    pub fn can_complete(&self) -> bool {
        self.status == WorkOrderStatus::InProgress && self.remaining_quantity() <= Decimal::ZERO
    }
}

impl StatusLifecycle for WorkOrder {
    type Status = WorkOrderStatus;

    fn status(&self) -> WorkOrderStatus {
        self.status
    }

    fn targets(from: WorkOrderStatus) -> &'static [WorkOrderStatus] {
        use WorkOrderStatus::*;
        match from {
            Created => &[Released],
            Released => &[InProgress],
            InProgress => &[Completed, Cancelled, OnHold],
            OnHold => &[InProgress],
            Completed | Cancelled => &[],
        }
    }

    fn missing_for(&self, target: WorkOrderStatus) -> Vec<&'static str> {
        match target {
            WorkOrderStatus::InProgress => {
                missing(&[("actual_start_date", self.actual_start_date.is_some())])
            }
            WorkOrderStatus::Completed => missing(&[
                ("actual_start_date", self.actual_start_date.is_some()),
                ("actual_end_date", self.actual_end_date.is_some()),
            ]),
            _ => Vec::new(),
        }
    }

    fn preconditions(&self, target: WorkOrderStatus) -> Vec<Violation> {
        if target == WorkOrderStatus::Completed && !self.can_complete() {
            return vec![Violation::new(
                "completed_quantity",
                codes::INVALID_STATUS_TRANSITION,
                format!(
                    "Work order cannot be completed with {} still remaining",
                    self.remaining_quantity()
                ),
            )];
        }
        Vec::new()
    }
}

impl StatusLifecycle for ProductionConfirmation {
    type Status = ConfirmationStatus;

    fn status(&self) -> ConfirmationStatus {
        self.status
    }

    fn targets(from: ConfirmationStatus) -> &'static [ConfirmationStatus] {
        use ConfirmationStatus::*;
        match from {
            Draft => &[Confirmed, Cancelled],
            Confirmed => &[Posted, Cancelled],
            Posted | Cancelled => &[],
        }
    }

    fn missing_for(&self, target: ConfirmationStatus) -> Vec<&'static str> {
        match target {
            ConfirmationStatus::Confirmed => missing(&[
                ("operator_user_id", self.operator_user_id.is_some()),
                ("confirmed_by_user_id", self.confirmed_by_user_id.is_some()),
                ("confirmed_date", self.confirmed_date.is_some()),
            ]),
            _ => Vec::new(),
        }
    }
}

impl StatusLifecycle for BillOfMaterial {
    type Status = BomApprovalStatus;

    fn status(&self) -> BomApprovalStatus {
        self.approval_status
    }

    fn targets(from: BomApprovalStatus) -> &'static [BomApprovalStatus] {
        use BomApprovalStatus::*;
        match from {
            Draft => &[Pending, Approved, Obsolete],
            Pending => &[Draft, Approved, Obsolete],
            Approved => &[Obsolete],
            Obsolete => &[],
        }
    }

    fn missing_for(&self, _target: BomApprovalStatus) -> Vec<&'static str> {
        Vec::new()
    }

    fn preconditions(&self, target: BomApprovalStatus) -> Vec<Violation> {
        if target == BomApprovalStatus::Approved && self.items.is_empty() {
            return vec![Violation::new(
                "items",
                ITEMS_REQUIRED,
                "An approved BOM must contain at least one item",
            )];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn work_order(status: WorkOrderStatus) -> WorkOrder {
        let mut wo = WorkOrder::new("WO-7", Uuid::new_v4(), Uuid::new_v4(), dec!(100));
        wo.status = status;
        wo
    }

    #[rstest]
    #[case(WorkOrderStatus::Created, WorkOrderStatus::Released, true)]
    #[case(WorkOrderStatus::Created, WorkOrderStatus::InProgress, false)]
    #[case(WorkOrderStatus::Released, WorkOrderStatus::Completed, false)]
    #[case(WorkOrderStatus::InProgress, WorkOrderStatus::OnHold, true)]
    #[case(WorkOrderStatus::InProgress, WorkOrderStatus::Cancelled, true)]
    #[case(WorkOrderStatus::Completed, WorkOrderStatus::InProgress, false)]
    #[case(WorkOrderStatus::Cancelled, WorkOrderStatus::Released, false)]
    fn work_order_graph(
        #[case] from: WorkOrderStatus,
        #[case] to: WorkOrderStatus,
        #[case] edge: bool,
    ) {
        let mut wo = work_order(from);
        wo.actual_start_date = Some(Utc::now());
        let check = can_transition(&wo, to);
        assert_eq!(
            !check
                .blockers
                .iter()
                .any(|v| v.rule == codes::INVALID_STATUS_TRANSITION && v.field == "status"),
            edge
        );
    }

    #[test]
    fn entering_in_progress_needs_actual_start() {
        let check = can_transition(
            &work_order(WorkOrderStatus::Released),
            WorkOrderStatus::InProgress,
        );
        assert!(!check.is_permitted());
        assert_eq!(check.missing_fields, vec!["actual_start_date"]);

        let violations = check.into_violations();
        assert_eq!(violations.rules(), vec![codes::REQUIRED]);
    }

    #[test]
    fn completing_requires_nothing_remaining() {
        let mut wo = work_order(WorkOrderStatus::InProgress);
        wo.actual_start_date = Some(Utc::now());
        wo.actual_end_date = Some(Utc::now());
        wo.completed_quantity = dec!(60);
        assert!(!wo.can_complete());
        assert!(!can_transition(&wo, WorkOrderStatus::Completed).is_permitted());

        wo.completed_quantity = dec!(95);
        wo.scrap_quantity = dec!(5);
        assert!(wo.can_complete());
        assert!(can_transition(&wo, WorkOrderStatus::Completed).is_permitted());
    }

    #[test]
    fn confirming_lists_every_missing_field() {
        let pc = ProductionConfirmation::new("PC-1", Uuid::new_v4(), Utc::now(), dec!(3));
        let check = can_transition(&pc, ConfirmationStatus::Confirmed);

        assert_eq!(
            check.missing_fields,
            vec!["operator_user_id", "confirmed_by_user_id", "confirmed_date"]
        );
        assert!(check.blockers.is_empty());
    }

    #[test]
    fn posted_confirmation_is_final() {
        let mut pc = ProductionConfirmation::new("PC-2", Uuid::new_v4(), Utc::now(), dec!(3));
        pc.status = ConfirmationStatus::Posted;
        let violations = can_transition(&pc, ConfirmationStatus::Cancelled).into_violations();
        assert!(violations.has_rule(codes::INVALID_STATUS_TRANSITION));
    }

    #[test]
    fn approving_empty_bom_is_blocked() {
        let bom = BillOfMaterial::new("BOM-9", "Shelf", Uuid::new_v4(), "1", dec!(1));
        let check = can_transition(&bom, BomApprovalStatus::Approved);
        assert!(!check.is_permitted());
        assert!(check.into_violations().has_rule(ITEMS_REQUIRED));
    }
}
