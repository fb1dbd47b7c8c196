use std::collections::HashMap;

use metrics::counter;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_transition, ensure_valid, publish, validation_context, Repositories};
use crate::audit::AuditContext;
use crate::config::RulesConfig;
use crate::derived::{compute_derived, BillOfMaterialDerived, WithDerived};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::lifecycle::can_transition;
use crate::models::{BillOfMaterial, BillOfMaterialItem, BomApprovalStatus, Material};
use crate::reports::{material_requirements, MaterialRequirement};
use crate::repository::{ListQuery, Page};

/// Bills of materials and their component lines.
#[derive(Clone)]
pub struct BomService {
    repos: Repositories,
    rules: RulesConfig,
    event_sender: Option<EventSender>,
}

impl BomService {
    pub fn new(repos: Repositories, rules: RulesConfig, event_sender: Option<EventSender>) -> Self {
        Self {
            repos,
            rules,
            event_sender,
        }
    }

    async fn ensure_materials_exist(&self, bom: &BillOfMaterial) -> Result<(), ServiceError> {
        self.repos.materials.get(bom.product_material_id).await?;
        for item in &bom.items {
            self.repos.materials.get(item.component_material_id).await?;
        }
        Ok(())
    }

    async fn editable(&self, bom_id: Uuid) -> Result<BillOfMaterial, ServiceError> {
        let bom = self.repos.boms.get(bom_id).await?;
        if !bom.approval_status.is_editable() {
            return Err(ServiceError::InvalidOperation(format!(
                "BOM {} is {} and can no longer be changed",
                bom.code,
                bom.approval_status.display_label()
            )));
        }
        Ok(bom)
    }

    /// Creates a BOM in DRAFT or PENDING status
    #[instrument(skip(self, bom), fields(code = %bom.code))]
    pub async fn create_bom(
        &self,
        mut bom: BillOfMaterial,
        ctx: &AuditContext,
    ) -> Result<BillOfMaterial, ServiceError> {
        if !bom.approval_status.is_editable() {
            return Err(ServiceError::InvalidOperation(format!(
                "A new BOM must start as DRAFT or PENDING, got {}",
                bom.approval_status
            )));
        }
        bom.sort_items();
        ensure_valid(&bom, &validation_context(&self.rules, ctx))?;
        self.ensure_materials_exist(&bom).await?;

        let created = self.repos.boms.insert(bom, ctx).await?;

        counter!("erp.boms.created", 1);
        publish(self.event_sender.as_ref(), Event::BomCreated(created.id)).await;
        info!(bom_id = %created.id, items = created.items.len(), "BOM created");
        Ok(created)
    }

    /// Replaces header and items of an editable BOM. The approval status is
    /// only changed through [`BomService::change_approval_status`].
    #[instrument(skip(self, bom), fields(bom_id = %bom.id))]
    pub async fn update_bom(
        &self,
        mut bom: BillOfMaterial,
        ctx: &AuditContext,
    ) -> Result<BillOfMaterial, ServiceError> {
        let stored = self.editable(bom.id).await?;
        bom.approval_status = stored.approval_status;
        bom.sort_items();
        ensure_valid(&bom, &validation_context(&self.rules, ctx))?;
        self.ensure_materials_exist(&bom).await?;

        let updated = self.repos.boms.update(bom, ctx).await?;

        counter!("erp.boms.updated", 1);
        publish(self.event_sender.as_ref(), Event::BomUpdated(updated.id)).await;
        info!(bom_id = %updated.id, "BOM updated");
        Ok(updated)
    }

    /// Appends a component line; a line number of 0 takes the next free one
    #[instrument(skip(self, item))]
    pub async fn add_item(
        &self,
        bom_id: Uuid,
        mut item: BillOfMaterialItem,
        ctx: &AuditContext,
    ) -> Result<BillOfMaterial, ServiceError> {
        let mut bom = self.editable(bom_id).await?;
        self.repos.materials.get(item.component_material_id).await?;

        if item.line_number == 0 {
            item.line_number = bom.next_line_number();
        }
        let item_id = item.id;
        bom.items.push(item);
        bom.sort_items();
        ensure_valid(&bom, &validation_context(&self.rules, ctx))?;

        let updated = self.repos.boms.update(bom, ctx).await?;

        counter!("erp.boms.items_added", 1);
        publish(
            self.event_sender.as_ref(),
            Event::BomItemAdded { bom_id, item_id },
        )
        .await;
        info!(%bom_id, %item_id, "BOM item added");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        bom_id: Uuid,
        item_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<BillOfMaterial, ServiceError> {
        let mut bom = self.editable(bom_id).await?;
        if bom.item(item_id).is_none() {
            return Err(ServiceError::not_found("BillOfMaterialItem", item_id));
        }
        bom.items.retain(|item| item.id != item_id);
        ensure_valid(&bom, &validation_context(&self.rules, ctx))?;

        let updated = self.repos.boms.update(bom, ctx).await?;

        counter!("erp.boms.items_removed", 1);
        publish(
            self.event_sender.as_ref(),
            Event::BomItemRemoved { bom_id, item_id },
        )
        .await;
        info!(%bom_id, %item_id, "BOM item removed");
        Ok(updated)
    }

    /// Moves a BOM through DRAFT, PENDING, APPROVED and OBSOLETE
    #[instrument(skip(self))]
    pub async fn change_approval_status(
        &self,
        bom_id: Uuid,
        target: BomApprovalStatus,
        ctx: &AuditContext,
    ) -> Result<BillOfMaterial, ServiceError> {
        let mut bom = self.repos.boms.get(bom_id).await?;
        let old_status = bom.approval_status;
        ensure_transition("BillOfMaterial", can_transition(&bom, target))?;

        bom.approval_status = target;
        ensure_valid(&bom, &validation_context(&self.rules, ctx))?;
        let updated = self.repos.boms.update(bom, ctx).await?;

        match target {
            BomApprovalStatus::Approved => counter!("erp.boms.approved", 1),
            BomApprovalStatus::Obsolete => counter!("erp.boms.obsoleted", 1),
            _ => counter!("erp.boms.status_changed", 1),
        }
        publish(
            self.event_sender.as_ref(),
            Event::BomApprovalChanged {
                bom_id,
                old_status,
                new_status: target,
            },
        )
        .await;
        info!(%bom_id, from = %old_status, to = %target, "BOM approval status changed");
        Ok(updated)
    }

    /// Soft-deletes a BOM that no open work order uses
    #[instrument(skip(self))]
    pub async fn delete_bom(&self, bom_id: Uuid, ctx: &AuditContext) -> Result<(), ServiceError> {
        self.repos.boms.get(bom_id).await?;

        let open_order = self
            .repos
            .work_orders
            .all_active()
            .await?
            .into_iter()
            .find(|wo| wo.bom_id == bom_id && !wo.status.is_terminal());
        if let Some(wo) = open_order {
            return Err(ServiceError::Conflict(format!(
                "BOM {} is used by open work order {}",
                bom_id, wo.number
            )));
        }

        self.repos.boms.soft_delete(bom_id, ctx).await?;

        counter!("erp.boms.deleted", 1);
        publish(self.event_sender.as_ref(), Event::BomDeleted(bom_id)).await;
        info!(%bom_id, "BOM deleted");
        Ok(())
    }

    /// BOM with per-item total quantities
    pub async fn get_bom(
        &self,
        bom_id: Uuid,
    ) -> Result<WithDerived<BillOfMaterial, BillOfMaterialDerived>, ServiceError> {
        let bom = self.repos.boms.get(bom_id).await?;
        Ok(compute_derived(&bom))
    }

    pub async fn list_boms(&self, query: &ListQuery) -> Result<Page<BillOfMaterial>, ServiceError> {
        let query = query.normalized(self.rules.default_page_size, self.rules.max_page_size);
        self.repos.boms.list(&query).await
    }

    /// Component quantities needed to produce `quantity` of the BOM's product
    #[instrument(skip(self))]
    pub async fn material_requirements(
        &self,
        bom_id: Uuid,
        quantity: Decimal,
    ) -> Result<Vec<MaterialRequirement>, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Production quantity must be positive, got: {}",
                quantity
            )));
        }

        let bom = self.repos.boms.get(bom_id).await?;
        let mut materials: HashMap<Uuid, Material> = HashMap::new();
        for item in &bom.items {
            if let Some(material) = self.repos.materials.find(item.component_material_id).await? {
                materials.insert(material.id, material);
            }
        }

        Ok(material_requirements(&bom, quantity, &materials))
    }
}
