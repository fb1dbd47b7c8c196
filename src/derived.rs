//! Read-only quantities computed from stored fields.
//!
//! Nothing here is persisted. Every call recomputes from the record, so the
//! results are always consistent with the current field values.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{BillOfMaterial, BillOfMaterialItem, ProductionConfirmation, WorkOrder};

/// `part / whole * 100`, or zero when `whole` is zero or the result does not
/// fit in a `Decimal`.
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Exact sum, or `None` on overflow.
pub fn checked_sum<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value))
}

/// Sum clamped to the `Decimal` range.
pub fn saturating_sum<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, value| acc.saturating_add(value))
}

/// Quantity including expected waste: `quantity * (1 + scrap_factor / 100)`,
/// clamped to the `Decimal` range.
pub fn total_item_quantity(quantity: Decimal, scrap_factor: Decimal) -> Decimal {
    let factor = (scrap_factor / Decimal::ONE_HUNDRED).saturating_add(Decimal::ONE);
    quantity.saturating_mul(factor)
}

/// Records with derived fields.
pub trait ComputeDerived {
    type Derived: Serialize + Clone + PartialEq + std::fmt::Debug;

    fn derived(&self) -> Self::Derived;
}

/// A record next to its derived fields; both serialise flat into one object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithDerived<T, D> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(flatten)]
    pub derived: D,
}

pub fn compute_derived<T>(entity: &T) -> WithDerived<T, T::Derived>
where
    T: ComputeDerived + Clone,
{
    WithDerived {
        entity: entity.clone(),
        derived: entity.derived(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomItemDerived {
    pub total_quantity: Decimal,
}

impl ComputeDerived for BillOfMaterialItem {
    type Derived = BomItemDerived;

    fn derived(&self) -> BomItemDerived {
        BomItemDerived {
            total_quantity: total_item_quantity(self.quantity, self.scrap_factor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTotal {
    pub item_id: Uuid,
    pub line_number: i32,
    pub total_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillOfMaterialDerived {
    pub item_count: usize,
    pub item_totals: Vec<ItemTotal>,
}

impl ComputeDerived for BillOfMaterial {
    type Derived = BillOfMaterialDerived;

    fn derived(&self) -> BillOfMaterialDerived {
        BillOfMaterialDerived {
            item_count: self.items.len(),
            item_totals: self
                .items
                .iter()
                .map(|item| ItemTotal {
                    item_id: item.id,
                    line_number: item.line_number,
                    total_quantity: item.derived().total_quantity,
                })
                .collect(),
        }
    }
}

/// Component quantity needed to produce some amount of a BOM's product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRequirement {
    pub item_id: Uuid,
    pub line_number: i32,
    pub component_material_id: Uuid,
    pub required_quantity: Decimal,
}

/// Scales each item's total quantity from `base_quantity` to `quantity`.
/// A zero base quantity yields zero requirements.
pub fn component_requirements(
    bom: &BillOfMaterial,
    quantity: Decimal,
) -> Vec<ComponentRequirement> {
    let factor = quantity
        .checked_div(bom.base_quantity)
        .unwrap_or(Decimal::ZERO);

    bom.items
        .iter()
        .map(|item| ComponentRequirement {
            item_id: item.id,
            line_number: item.line_number,
            component_material_id: item.component_material_id,
            required_quantity: total_item_quantity(item.quantity, item.scrap_factor)
                .saturating_mul(factor),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrderDerived {
    pub remaining_quantity: Decimal,
    pub yield_percentage: Decimal,
}

impl WorkOrder {
    /// Clamped to the `Decimal` range.
    pub fn remaining_quantity(&self) -> Decimal {
        self.planned_quantity
            .saturating_sub(self.completed_quantity)
            .saturating_sub(self.scrap_quantity)
    }

    /// Completed plus scrap, `None` when the sum overflows.
    pub fn reported_quantity(&self) -> Option<Decimal> {
        self.completed_quantity.checked_add(self.scrap_quantity)
    }

    pub fn yield_percentage(&self) -> Decimal {
        if self.planned_quantity > Decimal::ZERO {
            percentage(self.completed_quantity, self.planned_quantity)
        } else {
            Decimal::ZERO
        }
    }
}

impl ComputeDerived for WorkOrder {
    type Derived = WorkOrderDerived;

    fn derived(&self) -> WorkOrderDerived {
        WorkOrderDerived {
            remaining_quantity: self.remaining_quantity(),
            yield_percentage: self.yield_percentage(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationDerived {
    pub total_quantity: Decimal,
    pub total_time: Decimal,
    /// `None` when no time was booked.
    pub efficiency_percentage: Option<Decimal>,
    pub scrap_percentage: Decimal,
    pub rework_percentage: Decimal,
    pub yield_percentage: Decimal,
}

impl ProductionConfirmation {
    /// Confirmed + scrap + rework, clamped to the `Decimal` range.
    pub fn total_quantity(&self) -> Decimal {
        saturating_sum(self.quantities())
    }

    /// Confirmed + scrap + rework, `None` when the sum overflows.
    pub fn checked_total_quantity(&self) -> Option<Decimal> {
        checked_sum(self.quantities())
    }

    fn quantities(&self) -> [Decimal; 3] {
        [self.confirmed_quantity, self.scrap_quantity, self.rework_quantity]
    }

    /// Setup + run + down, with missing times counted as zero.
    pub fn total_time(&self) -> Decimal {
        saturating_sum([self.setup_time, self.run_time, self.down_time].into_iter().flatten())
    }
}

/// `run / total * 100`, `None` when `total` is not positive.
pub fn efficiency(run_time: Decimal, total_time: Decimal) -> Option<Decimal> {
    if total_time > Decimal::ZERO {
        Some(percentage(run_time, total_time))
    } else {
        None
    }
}

impl ComputeDerived for ProductionConfirmation {
    type Derived = ConfirmationDerived;

    fn derived(&self) -> ConfirmationDerived {
        let total_quantity = self.total_quantity();
        let total_time = self.total_time();

        ConfirmationDerived {
            total_quantity,
            total_time,
            efficiency_percentage: efficiency(self.run_time.unwrap_or_default(), total_time),
            scrap_percentage: percentage(self.scrap_quantity, total_quantity),
            rework_percentage: percentage(self.rework_quantity, total_quantity),
            yield_percentage: percentage(self.confirmed_quantity, total_quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentType;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn scrap_factor_boundaries() {
        assert_eq!(total_item_quantity(dec!(7), dec!(0)), dec!(7));
        assert_eq!(total_item_quantity(dec!(7), dec!(100)), dec!(14));
        assert_eq!(total_item_quantity(dec!(4), dec!(12.5)), dec!(4.5));
    }

    #[test]
    fn fully_reported_work_order() {
        let mut wo = WorkOrder::new("WO-1", Uuid::new_v4(), Uuid::new_v4(), dec!(100));
        wo.completed_quantity = dec!(100);

        let derived = wo.derived();
        assert_eq!(derived.remaining_quantity, dec!(0));
        assert_eq!(derived.yield_percentage, dec!(100));
    }

    #[test]
    fn zero_planned_quantity_yields_zero() {
        let wo = WorkOrder::new("WO-2", Uuid::new_v4(), Uuid::new_v4(), dec!(0));
        assert_eq!(wo.yield_percentage(), Decimal::ZERO);
    }

    #[test]
    fn confirmation_percentages() {
        let mut pc = ProductionConfirmation::new("PC-1", Uuid::new_v4(), Utc::now(), dec!(80))
            .with_times(dec!(15), dec!(60), dec!(25));
        pc.scrap_quantity = dec!(15);
        pc.rework_quantity = dec!(5);

        let derived = pc.derived();
        assert_eq!(derived.total_quantity, dec!(100));
        assert_eq!(derived.total_time, dec!(100));
        assert_eq!(derived.efficiency_percentage, Some(dec!(60)));
        assert_eq!(derived.scrap_percentage, dec!(15));
        assert_eq!(derived.rework_percentage, dec!(5));
        assert_eq!(derived.yield_percentage, dec!(80));
    }

    #[test]
    fn empty_confirmation_never_divides_by_zero() {
        let pc = ProductionConfirmation::new("PC-2", Uuid::new_v4(), Utc::now(), dec!(0));
        let derived = pc.derived();

        assert_eq!(derived.efficiency_percentage, None);
        assert_eq!(derived.yield_percentage, Decimal::ZERO);
        assert_eq!(derived.scrap_percentage, Decimal::ZERO);
    }

    #[test]
    fn derived_fields_serialise_flat() {
        let item = BillOfMaterialItem::new(Uuid::new_v4(), 10, dec!(2), ComponentType::Packaging)
            .with_scrap_factor(dec!(50));
        let value = serde_json::to_value(compute_derived(&item)).unwrap();

        assert_eq!(value["line_number"], serde_json::json!(10));
        assert!(value.get("total_quantity").is_some());
        assert!(value.get("entity").is_none());
    }

    #[test]
    fn requirements_scale_from_base_quantity() {
        let bom = BillOfMaterial::new("BOM-1", "Crate", Uuid::new_v4(), "1", dec!(10))
            .with_item(
                BillOfMaterialItem::new(Uuid::new_v4(), 10, dec!(4), ComponentType::RawMaterial)
                    .with_scrap_factor(dec!(25)),
            );

        let requirements = component_requirements(&bom, dec!(25));
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].required_quantity, dec!(12.5));

        let mut degenerate = bom.clone();
        degenerate.base_quantity = Decimal::ZERO;
        assert_eq!(
            component_requirements(&degenerate, dec!(5))[0].required_quantity,
            Decimal::ZERO
        );
    }

    #[test]
    fn oversized_work_order_quantities_do_not_panic() {
        let huge = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        let mut wo = WorkOrder::new("WO-3", Uuid::new_v4(), Uuid::new_v4(), dec!(1));
        wo.completed_quantity = huge;

        let derived = compute_derived(&wo).derived;
        assert_eq!(derived.yield_percentage, Decimal::ZERO);
        assert_eq!(derived.remaining_quantity, dec!(1) - huge);

        wo.completed_quantity = Decimal::MAX;
        wo.scrap_quantity = Decimal::MAX;
        wo.planned_quantity = Decimal::MIN;
        assert_eq!(wo.remaining_quantity(), Decimal::MIN);
        assert_eq!(wo.reported_quantity(), None);
    }

    #[test]
    fn oversized_confirmation_quantities_saturate() {
        let mut pc = ProductionConfirmation::new("PC-3", Uuid::new_v4(), Utc::now(), Decimal::MAX)
            .with_times(Decimal::MAX, Decimal::MAX, dec!(0));
        pc.scrap_quantity = Decimal::MAX;

        assert_eq!(pc.checked_total_quantity(), None);
        let derived = pc.derived();
        assert_eq!(derived.total_quantity, Decimal::MAX);
        assert_eq!(derived.total_time, Decimal::MAX);
        assert_eq!(derived.yield_percentage, dec!(100));
        assert_eq!(derived.efficiency_percentage, Some(dec!(100)));
    }

    #[test]
    fn oversized_bom_lines_saturate() {
        assert_eq!(total_item_quantity(Decimal::MAX, dec!(100)), Decimal::MAX);
        assert_eq!(total_item_quantity(Decimal::MAX, Decimal::MAX), Decimal::MAX);
        assert_eq!(percentage(Decimal::MAX, dec!(0.5)), Decimal::ZERO);
        assert_eq!(checked_sum([Decimal::MAX, dec!(1)]), None);
        assert_eq!(checked_sum([dec!(1), dec!(2)]), Some(dec!(3)));
    }
}
