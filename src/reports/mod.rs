use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::derived::{component_requirements, efficiency, percentage, saturating_sum};
use crate::models::{BillOfMaterial, IssueMethod, Material, ProductionConfirmation, WorkOrder};

/// Output reported against one work order, over its CONFIRMED and POSTED
/// confirmations. Times are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSummary {
    pub work_order_id: Uuid,
    pub work_order_number: String,
    pub planned_quantity: Decimal,
    pub confirmation_count: usize,
    #[serde(alias = "total_quantity_produced")]
    pub total_confirmed: Decimal,
    pub total_scrap: Decimal,
    pub total_rework: Decimal,
    pub total_quantity: Decimal,
    pub yield_percentage: Decimal,
    pub scrap_percentage: Decimal,
    pub rework_percentage: Decimal,
    pub total_setup_time: Decimal,
    pub total_run_time: Decimal,
    pub total_down_time: Decimal,
    pub efficiency_percentage: Option<Decimal>,
    pub remaining_quantity: Decimal,
}

impl ProductionSummary {
    /// Confirmations of other work orders and ones that are not yet (or no
    /// longer) counted are ignored.
    pub fn build(work_order: &WorkOrder, confirmations: &[ProductionConfirmation]) -> Self {
        let counted: Vec<&ProductionConfirmation> = confirmations
            .iter()
            .filter(|c| {
                c.work_order_id == work_order.id
                    && !c.audit.is_deleted
                    && c.status.counts_as_output()
            })
            .collect();

        let sum = |f: fn(&ProductionConfirmation) -> Decimal| -> Decimal {
            saturating_sum(counted.iter().map(|c| f(c)))
        };
        let total_confirmed = sum(|c| c.confirmed_quantity);
        let total_scrap = sum(|c| c.scrap_quantity);
        let total_rework = sum(|c| c.rework_quantity);
        let total_setup_time = sum(|c| c.setup_time.unwrap_or_default());
        let total_run_time = sum(|c| c.run_time.unwrap_or_default());
        let total_down_time = sum(|c| c.down_time.unwrap_or_default());

        let total_quantity = saturating_sum([total_confirmed, total_scrap, total_rework]);
        let total_time = saturating_sum([total_setup_time, total_run_time, total_down_time]);

        Self {
            work_order_id: work_order.id,
            work_order_number: work_order.number.clone(),
            planned_quantity: work_order.planned_quantity,
            confirmation_count: counted.len(),
            total_confirmed,
            total_scrap,
            total_rework,
            total_quantity,
            yield_percentage: percentage(total_confirmed, total_quantity),
            scrap_percentage: percentage(total_scrap, total_quantity),
            rework_percentage: percentage(total_rework, total_quantity),
            total_setup_time,
            total_run_time,
            total_down_time,
            efficiency_percentage: efficiency(total_run_time, total_time),
            remaining_quantity: work_order.remaining_quantity(),
        }
    }
}

/// One BOM line scaled to a production quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub bom_id: Uuid,
    pub line_number: i32,
    pub component_material_id: Uuid,
    pub component_code: Option<String>,
    pub component_name: Option<String>,
    pub unit_of_measure: Option<String>,
    pub issue_method: IssueMethod,
    pub required_quantity: Decimal,
}

/// `materials` supplies card details; components missing from it are still
/// listed, without code, name or unit.
pub fn material_requirements(
    bom: &BillOfMaterial,
    quantity: Decimal,
    materials: &HashMap<Uuid, Material>,
) -> Vec<MaterialRequirement> {
    let issue_methods: HashMap<Uuid, IssueMethod> = bom
        .items
        .iter()
        .map(|item| (item.id, item.issue_method))
        .collect();

    component_requirements(bom, quantity)
        .into_iter()
        .map(|req| {
            let material = materials.get(&req.component_material_id);
            MaterialRequirement {
                bom_id: bom.id,
                line_number: req.line_number,
                component_material_id: req.component_material_id,
                component_code: material.map(|m| m.code.clone()),
                component_name: material.map(|m| m.name.clone()),
                unit_of_measure: material.map(|m| m.unit_of_measure.clone()),
                issue_method: issue_methods
                    .get(&req.item_id)
                    .copied()
                    .unwrap_or(IssueMethod::Manual),
                required_quantity: req.required_quantity,
            }
        })
        .collect()
}
