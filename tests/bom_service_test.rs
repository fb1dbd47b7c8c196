//! Bills of materials: editing, approval and requirement explosion

mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use common::{at, seed_catalog, services, started_work_order};
use erp_core::{
    errors::ServiceError,
    models::{
        BillOfMaterial, BillOfMaterialItem, BomApprovalStatus, ComponentType, Material,
        MaterialType,
    },
    validation::bill_of_material::{COMPONENT_IS_PRODUCT, DUPLICATE_LINE_NUMBER, ITEMS_REQUIRED},
};

#[tokio::test]
async fn empty_bom_cannot_be_approved() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;

    let bom = BillOfMaterial::new("BOM-EMPTY", "Empty", catalog.product.id, "1", dec!(1));
    let bom = svc.boms.create_bom(bom, &at(1)).await.unwrap();
    assert_eq!(bom.approval_status, BomApprovalStatus::Draft);

    let err = svc
        .boms
        .change_approval_status(bom.id, BomApprovalStatus::Approved, &at(2))
        .await
        .unwrap_err();
    assert!(err.violations().is_some_and(|v| v.has_rule(ITEMS_REQUIRED)));

    let pending = svc
        .boms
        .change_approval_status(bom.id, BomApprovalStatus::Pending, &at(3))
        .await
        .unwrap();
    assert_eq!(pending.approval_status, BomApprovalStatus::Pending);
}

#[tokio::test]
async fn item_lines_are_numbered_and_checked() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let screw = svc
        .materials
        .create_material(Material::new("SCREW", "Screw", MaterialType::Consumable, "PCS"), &at(0))
        .await
        .unwrap();

    let bom = BillOfMaterial::new("BOM-T2", "Table v2", catalog.product.id, "2", dec!(1))
        .with_item(BillOfMaterialItem::new(
            catalog.leg.id,
            10,
            dec!(4),
            ComponentType::SemiFinished,
        ));
    let bom = svc.boms.create_bom(bom, &at(1)).await.unwrap();

    let with_screws = svc
        .boms
        .add_item(
            bom.id,
            BillOfMaterialItem::new(screw.id, 0, dec!(16), ComponentType::Consumable)
                .with_scrap_factor(dec!(25)),
            &at(2),
        )
        .await
        .unwrap();
    let lines: Vec<i32> = with_screws.items.iter().map(|i| i.line_number).collect();
    assert_eq!(lines, vec![10, 20]);

    let view = svc.boms.get_bom(bom.id).await.unwrap();
    assert_eq!(view.derived.item_count, 2);
    assert_eq!(view.derived.item_totals[1].total_quantity, dec!(20));

    let err = svc
        .boms
        .add_item(
            bom.id,
            BillOfMaterialItem::new(catalog.top.id, 10, dec!(1), ComponentType::SemiFinished),
            &at(3),
        )
        .await
        .unwrap_err();
    assert!(err.violations().is_some_and(|v| v.has_rule(DUPLICATE_LINE_NUMBER)));

    let err = svc
        .boms
        .add_item(
            bom.id,
            BillOfMaterialItem::new(catalog.product.id, 30, dec!(1), ComponentType::SemiFinished),
            &at(3),
        )
        .await
        .unwrap_err();
    assert!(err.violations().is_some_and(|v| v.has_rule(COMPONENT_IS_PRODUCT)));

    let screw_line = with_screws.items[1].id;
    let trimmed = svc.boms.remove_item(bom.id, screw_line, &at(4)).await.unwrap();
    assert_eq!(trimmed.items.len(), 1);
}

#[tokio::test]
async fn approved_bom_is_frozen() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;

    assert_matches!(
        svc.boms
            .add_item(
                catalog.bom.id,
                BillOfMaterialItem::new(catalog.leg.id, 30, dec!(1), ComponentType::SemiFinished),
                &at(1),
            )
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
    assert_matches!(
        svc.boms
            .change_approval_status(catalog.bom.id, BomApprovalStatus::Draft, &at(1))
            .await,
        Err(ServiceError::Validation(_))
    );

    let obsolete = svc
        .boms
        .change_approval_status(catalog.bom.id, BomApprovalStatus::Obsolete, &at(2))
        .await
        .unwrap();
    assert_eq!(obsolete.approval_status, BomApprovalStatus::Obsolete);
}

#[tokio::test]
async fn requirements_scale_with_quantity() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;

    let requirements = svc
        .boms
        .material_requirements(catalog.bom.id, dec!(3))
        .await
        .unwrap();
    assert_eq!(requirements.len(), 2);
    assert_eq!(requirements[0].component_code.as_deref(), Some("LEG"));
    assert_eq!(requirements[0].required_quantity, dec!(12));
    assert_eq!(requirements[1].component_code.as_deref(), Some("TOP"));
    assert_eq!(requirements[1].required_quantity, dec!(3));

    assert_matches!(
        svc.boms.material_requirements(catalog.bom.id, dec!(0)).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn bom_in_use_cannot_be_deleted() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(2)).await;

    assert_matches!(
        svc.boms.delete_bom(catalog.bom.id, &at(10)).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        svc.materials.delete_material(catalog.leg.id, &at(10)).await,
        Err(ServiceError::Conflict(_))
    );

    svc.work_orders.cancel(wo.id, &at(11)).await.unwrap();
    svc.boms.delete_bom(catalog.bom.id, &at(12)).await.unwrap();
    assert_matches!(
        svc.boms.get_bom(catalog.bom.id).await,
        Err(ServiceError::NotFound(_))
    );

    svc.materials.delete_material(catalog.leg.id, &at(13)).await.unwrap();
}

#[tokio::test]
async fn components_must_exist() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;

    let ghost = uuid::Uuid::new_v4();
    let bom = BillOfMaterial::new("BOM-GHOST", "Ghost", catalog.product.id, "1", dec!(1))
        .with_item(BillOfMaterialItem::new(ghost, 10, dec!(1), ComponentType::RawMaterial));
    assert_matches!(
        svc.boms.create_bom(bom, &at(1)).await,
        Err(ServiceError::NotFound(_))
    );
}
