use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::audit::{impl_auditable, AuditFields};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Created,
    Released,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl WorkOrderStatus {
    pub fn display_label(self) -> &'static str {
        match self {
            WorkOrderStatus::Created => "Created",
            WorkOrderStatus::Released => "Released",
            WorkOrderStatus::InProgress => "In Progress",
            WorkOrderStatus::Completed => "Completed",
            WorkOrderStatus::Cancelled => "Cancelled",
            WorkOrderStatus::OnHold => "On Hold",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkOrderStatus::Completed | WorkOrderStatus::Cancelled)
    }

    /// Statuses in which production has started.
    pub fn has_started(self) -> bool {
        matches!(
            self,
            WorkOrderStatus::InProgress | WorkOrderStatus::Completed | WorkOrderStatus::OnHold
        )
    }
}

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;
pub const DEFAULT_PRIORITY: i32 = 3;

/// Instruction to produce `planned_quantity` of a material with a given BOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub number: String,
    pub bom_id: Uuid,
    pub product_material_id: Uuid,
    pub planned_quantity: Decimal,
    #[serde(default)]
    pub completed_quantity: Decimal,
    #[serde(default)]
    pub scrap_quantity: Decimal,
    #[serde(default = "default_status")]
    pub status: WorkOrderStatus,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub planned_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub planned_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_percentage: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub audit: AuditFields,
}

fn default_status() -> WorkOrderStatus {
    WorkOrderStatus::Created
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl WorkOrder {
    pub fn new(
        number: impl Into<String>,
        bom_id: Uuid,
        product_material_id: Uuid,
        planned_quantity: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            bom_id,
            product_material_id,
            planned_quantity,
            completed_quantity: Decimal::ZERO,
            scrap_quantity: Decimal::ZERO,
            status: WorkOrderStatus::Created,
            priority: DEFAULT_PRIORITY,
            planned_start_date: None,
            planned_end_date: None,
            actual_start_date: None,
            actual_end_date: None,
            completion_percentage: Decimal::ZERO,
            notes: None,
            audit: AuditFields::default(),
        }
    }
}

impl_auditable!(WorkOrder);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_uses_screaming_snake_case_on_the_wire() {
        assert_eq!(WorkOrderStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(
            WorkOrderStatus::from_str("ON_HOLD").unwrap(),
            WorkOrderStatus::OnHold
        );
        assert_eq!(
            serde_json::to_value(WorkOrderStatus::OnHold).unwrap(),
            serde_json::json!("ON_HOLD")
        );
        assert_eq!(WorkOrderStatus::OnHold.display_label(), "On Hold");
    }

    #[test]
    fn terminal_statuses() {
        assert!(WorkOrderStatus::Completed.is_terminal());
        assert!(WorkOrderStatus::Cancelled.is_terminal());
        assert!(!WorkOrderStatus::OnHold.is_terminal());
        assert!(WorkOrderStatus::OnHold.has_started());
        assert!(!WorkOrderStatus::Released.has_started());
    }
}
