use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::audit::{impl_auditable, AuditFields};

/// Node of the material category tree. `parent_id` points at another
/// category; the tree itself is indexed out of band by
/// [`CategoryIndex`](crate::category_tree::CategoryIndex).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialCategory {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub audit: AuditFields,
}

impl MaterialCategory {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            description: None,
            parent_id: None,
            is_active: true,
            audit: AuditFields::default(),
        }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
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
pub enum MaterialType {
    RawMaterial,
    SemiFinished,
    FinishedGood,
    Packaging,
    Consumable,
    Service,
}

impl MaterialType {
    pub fn display_label(self) -> &'static str {
        match self {
            MaterialType::RawMaterial => "Raw Material",
            MaterialType::SemiFinished => "Semi-Finished",
            MaterialType::FinishedGood => "Finished Good",
            MaterialType::Packaging => "Packaging",
            MaterialType::Consumable => "Consumable",
            MaterialType::Service => "Service",
        }
    }

    /// Whether a BOM may produce this material.
    pub fn is_producible(self) -> bool {
        matches!(self, MaterialType::SemiFinished | MaterialType::FinishedGood)
    }
}

/// Material card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub material_type: MaterialType,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    pub unit_of_measure: String,
    #[serde(default)]
    pub purchase_price: Decimal,
    #[serde(default)]
    pub sales_price: Decimal,
    #[serde(default)]
    pub min_stock_level: Decimal,
    #[serde(default)]
    pub max_stock_level: Option<Decimal>,
    #[serde(default)]
    pub reorder_level: Decimal,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub width: Option<Decimal>,
    #[serde(default)]
    pub height: Option<Decimal>,
    #[serde(default)]
    pub length: Option<Decimal>,
    #[serde(default = "super::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub audit: AuditFields,
}

impl Material {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        material_type: MaterialType,
        unit_of_measure: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            description: None,
            material_type,
            category_id: None,
            unit_of_measure: unit_of_measure.into(),
            purchase_price: Decimal::ZERO,
            sales_price: Decimal::ZERO,
            min_stock_level: Decimal::ZERO,
            max_stock_level: None,
            reorder_level: Decimal::ZERO,
            weight: None,
            width: None,
            height: None,
            length: None,
            is_active: true,
            audit: AuditFields::default(),
        }
    }

    pub fn in_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl_auditable!(MaterialCategory, Material);
