use chrono::NaiveDate;
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
pub enum BomApprovalStatus {
    Draft,
    Pending,
    Approved,
    Obsolete,
}

impl BomApprovalStatus {
    pub fn display_label(self) -> &'static str {
        match self {
            BomApprovalStatus::Draft => "Draft",
            BomApprovalStatus::Pending => "Pending Approval",
            BomApprovalStatus::Approved => "Approved",
            BomApprovalStatus::Obsolete => "Obsolete",
        }
    }

    /// Structure (header and items) may only change before approval.
    pub fn is_editable(self) -> bool {
        matches!(self, BomApprovalStatus::Draft | BomApprovalStatus::Pending)
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
pub enum ComponentType {
    RawMaterial,
    SemiFinished,
    FinishedGood,
    Packaging,
    Consumable,
}

impl ComponentType {
    pub fn display_label(self) -> &'static str {
        match self {
            ComponentType::RawMaterial => "Raw Material",
            ComponentType::SemiFinished => "Semi-Finished",
            ComponentType::FinishedGood => "Finished Good",
            ComponentType::Packaging => "Packaging",
            ComponentType::Consumable => "Consumable",
        }
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
pub enum IssueMethod {
    Manual,
    Automatic,
    Backflush,
}

impl IssueMethod {
    pub fn display_label(self) -> &'static str {
        match self {
            IssueMethod::Manual => "Manual Issue",
            IssueMethod::Automatic => "Automatic Issue",
            IssueMethod::Backflush => "Backflush",
        }
    }
}

/// Component line of a bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterialItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub component_material_id: Uuid,
    pub line_number: i32,
    pub quantity: Decimal,
    /// Expected extra consumption due to waste, in percent.
    #[serde(default)]
    pub scrap_factor: Decimal,
    pub component_type: ComponentType,
    #[serde(default = "default_issue_method")]
    pub issue_method: IssueMethod,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_issue_method() -> IssueMethod {
    IssueMethod::Manual
}

impl BillOfMaterialItem {
    pub fn new(
        component_material_id: Uuid,
        line_number: i32,
        quantity: Decimal,
        component_type: ComponentType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            component_material_id,
            line_number,
            quantity,
            scrap_factor: Decimal::ZERO,
            component_type,
            issue_method: IssueMethod::Manual,
            valid_from: None,
            valid_to: None,
            notes: None,
        }
    }

    pub fn with_scrap_factor(mut self, scrap_factor: Decimal) -> Self {
        self.scrap_factor = scrap_factor;
        self
    }

    /// Whether the line applies on `date`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| date >= from)
            && self.valid_to.map_or(true, |to| date <= to)
    }
}

/// Recipe producing `base_quantity` units of the product material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterial {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub product_material_id: Uuid,
    pub version: String,
    pub base_quantity: Decimal,
    #[serde(default = "default_approval_status")]
    pub approval_status: BomApprovalStatus,
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<BillOfMaterialItem>,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub audit: AuditFields,
}

fn default_approval_status() -> BomApprovalStatus {
    BomApprovalStatus::Draft
}

impl BillOfMaterial {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        product_material_id: Uuid,
        version: impl Into<String>,
        base_quantity: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            description: None,
            product_material_id,
            version: version.into(),
            base_quantity,
            approval_status: BomApprovalStatus::Draft,
            effective_from: None,
            effective_to: None,
            items: Vec::new(),
            is_active: true,
            audit: AuditFields::default(),
        }
    }

    pub fn with_item(mut self, item: BillOfMaterialItem) -> Self {
        self.items.push(item);
        self.sort_items();
        self
    }

    /// Keeps items ordered by line number.
    pub fn sort_items(&mut self) {
        self.items.sort_by_key(|item| item.line_number);
    }

    pub fn item(&self, item_id: Uuid) -> Option<&BillOfMaterialItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Next free line number in steps of ten.
    pub fn next_line_number(&self) -> i32 {
        let last = self.items.iter().map(|i| i.line_number).max().unwrap_or(0);
        (last / 10 + 1) * 10
    }

    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from.map_or(true, |from| date >= from)
            && self.effective_to.map_or(true, |to| date <= to)
    }
}

impl_auditable!(BillOfMaterial);
