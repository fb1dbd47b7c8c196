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
pub enum ConfirmationStatus {
    Draft,
    Confirmed,
    Cancelled,
    Posted,
}

impl ConfirmationStatus {
    pub fn display_label(self) -> &'static str {
        match self {
            ConfirmationStatus::Draft => "Draft",
            ConfirmationStatus::Confirmed => "Confirmed",
            ConfirmationStatus::Cancelled => "Cancelled",
            ConfirmationStatus::Posted => "Posted",
        }
    }

    /// Confirmations that count towards production totals.
    pub fn counts_as_output(self) -> bool {
        matches!(self, ConfirmationStatus::Confirmed | ConfirmationStatus::Posted)
    }
}

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
pub enum QualityStatus {
    NotChecked,
    Passed,
    Failed,
    Pending,
    InProgress,
}

impl QualityStatus {
    pub fn display_label(self) -> &'static str {
        match self {
            QualityStatus::NotChecked => "Not Checked",
            QualityStatus::Passed => "Passed",
            QualityStatus::Failed => "Failed",
            QualityStatus::Pending => "Pending",
            QualityStatus::InProgress => "Inspection In Progress",
        }
    }
}

/// Actual output reported against a work order. Times are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfirmation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub number: String,
    pub work_order_id: Uuid,
    pub confirmation_date: DateTime<Utc>,
    #[serde(default)]
    pub confirmed_quantity: Decimal,
    #[serde(default)]
    pub scrap_quantity: Decimal,
    #[serde(default)]
    pub rework_quantity: Decimal,
    #[serde(default)]
    pub setup_time: Option<Decimal>,
    #[serde(default)]
    pub run_time: Option<Decimal>,
    #[serde(default)]
    pub down_time: Option<Decimal>,
    #[serde(default = "default_status")]
    pub status: ConfirmationStatus,
    #[serde(default = "default_quality_status")]
    pub quality_status: QualityStatus,
    #[serde(default)]
    pub quality_notes: Option<String>,
    #[serde(default)]
    pub operator_user_id: Option<Uuid>,
    #[serde(default)]
    pub confirmed_by_user_id: Option<Uuid>,
    #[serde(default)]
    pub confirmed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub audit: AuditFields,
}

fn default_status() -> ConfirmationStatus {
    ConfirmationStatus::Draft
}

fn default_quality_status() -> QualityStatus {
    QualityStatus::NotChecked
}

impl ProductionConfirmation {
    pub fn new(
        number: impl Into<String>,
        work_order_id: Uuid,
        confirmation_date: DateTime<Utc>,
        confirmed_quantity: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            work_order_id,
            confirmation_date,
            confirmed_quantity,
            scrap_quantity: Decimal::ZERO,
            rework_quantity: Decimal::ZERO,
            setup_time: None,
            run_time: None,
            down_time: None,
            status: ConfirmationStatus::Draft,
            quality_status: QualityStatus::NotChecked,
            quality_notes: None,
            operator_user_id: None,
            confirmed_by_user_id: None,
            confirmed_date: None,
            notes: None,
            audit: AuditFields::default(),
        }
    }

    pub fn with_times(mut self, setup: Decimal, run: Decimal, down: Decimal) -> Self {
        self.setup_time = Some(setup);
        self.run_time = Some(run);
        self.down_time = Some(down);
        self
    }
}

impl_auditable!(ProductionConfirmation);
