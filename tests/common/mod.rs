#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use erp_core::{
    audit::AuditContext,
    config::RulesConfig,
    events::{self, Event},
    models::{
        BillOfMaterial, BillOfMaterialItem, BomApprovalStatus, ComponentType, Material,
        MaterialType, WorkOrder,
    },
    services::Repositories,
    ErpServices,
};
use tokio::sync::mpsc;

/// Fixed start of every test timeline.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

/// Audit context `minutes` after [`t0`], acting as the operator.
pub fn at(minutes: i64) -> AuditContext {
    AuditContext::at(Some(operator()), t0() + Duration::minutes(minutes))
}

pub fn operator() -> Uuid {
    Uuid::from_u128(0x0A)
}

pub fn supervisor() -> Uuid {
    Uuid::from_u128(0x0B)
}

pub fn services() -> ErpServices {
    ErpServices::in_memory(RulesConfig::default())
}

/// Services publishing into a channel the test can drain.
pub fn services_with_events() -> (ErpServices, mpsc::Receiver<Event>) {
    let (sender, rx) = events::channel(64);
    let services = ErpServices::new(
        Repositories::in_memory(),
        RulesConfig::default(),
        Some(sender),
    );
    (services, rx)
}

pub fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}

/// Product "TABLE" built from 4 legs and 1 top, each with no scrap.
pub struct Catalog {
    pub product: Material,
    pub leg: Material,
    pub top: Material,
    pub bom: BillOfMaterial,
}

pub async fn seed_catalog(svc: &ErpServices) -> Catalog {
    let ctx = at(0);
    let product = svc
        .materials
        .create_material(Material::new("TABLE", "Table", MaterialType::FinishedGood, "PCS"), &ctx)
        .await
        .unwrap();
    let leg = svc
        .materials
        .create_material(Material::new("LEG", "Table leg", MaterialType::SemiFinished, "PCS"), &ctx)
        .await
        .unwrap();
    let top = svc
        .materials
        .create_material(Material::new("TOP", "Table top", MaterialType::SemiFinished, "PCS"), &ctx)
        .await
        .unwrap();

    let bom = BillOfMaterial::new("BOM-TABLE", "Table", product.id, "1", dec!(1))
        .with_item(BillOfMaterialItem::new(leg.id, 10, dec!(4), ComponentType::SemiFinished))
        .with_item(BillOfMaterialItem::new(top.id, 20, dec!(1), ComponentType::SemiFinished));
    let bom = svc.boms.create_bom(bom, &ctx).await.unwrap();
    let bom = svc
        .boms
        .change_approval_status(bom.id, BomApprovalStatus::Approved, &ctx)
        .await
        .unwrap();

    Catalog {
        product,
        leg,
        top,
        bom,
    }
}

/// Creates, releases and starts a work order for `planned` tables.
pub async fn started_work_order(
    svc: &ErpServices,
    catalog: &Catalog,
    planned: Decimal,
) -> WorkOrder {
    let number = format!("WO-{}", Uuid::new_v4().simple());
    let wo = WorkOrder::new(number, catalog.bom.id, catalog.product.id, planned);
    let wo = svc.work_orders.create_work_order(wo, &at(1)).await.unwrap();
    svc.work_orders.release(wo.id, &at(2)).await.unwrap();
    svc.work_orders.start(wo.id, &at(3)).await.unwrap()
}
