use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_transition, ensure_valid, publish, validation_context, Repositories};
use crate::audit::AuditContext;
use crate::config::RulesConfig;
use crate::derived::{compute_derived, WithDerived, WorkOrderDerived};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::lifecycle::can_transition;
use crate::models::{BomApprovalStatus, ConfirmationStatus, WorkOrder, WorkOrderStatus};
use crate::repository::{ListQuery, Page};

/// Planning fields that may change before a work order is finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderPlan {
    #[serde(default)]
    pub planned_quantity: Option<Decimal>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub planned_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub planned_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkOrderPlan {
    fn apply(self, work_order: &mut WorkOrder) {
        if let Some(quantity) = self.planned_quantity {
            work_order.planned_quantity = quantity;
        }
        if let Some(priority) = self.priority {
            work_order.priority = priority;
        }
        if self.planned_start_date.is_some() {
            work_order.planned_start_date = self.planned_start_date;
        }
        if self.planned_end_date.is_some() {
            work_order.planned_end_date = self.planned_end_date;
        }
        if self.notes.is_some() {
            work_order.notes = self.notes;
        }
    }
}

/// Work order lifecycle: creation against an approved BOM, planning and
/// status changes.
#[derive(Clone)]
pub struct WorkOrderService {
    repos: Repositories,
    rules: RulesConfig,
    event_sender: Option<EventSender>,
}

impl WorkOrderService {
    pub fn new(repos: Repositories, rules: RulesConfig, event_sender: Option<EventSender>) -> Self {
        Self {
            repos,
            rules,
            event_sender,
        }
    }

    /// Creates a work order in CREATED status
    #[instrument(skip(self, work_order), fields(number = %work_order.number))]
    pub async fn create_work_order(
        &self,
        work_order: WorkOrder,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        if work_order.status != WorkOrderStatus::Created {
            return Err(ServiceError::InvalidOperation(format!(
                "A new work order must start as CREATED, got {}",
                work_order.status
            )));
        }
        ensure_valid(&work_order, &validation_context(&self.rules, ctx))?;

        let bom = self.repos.boms.get(work_order.bom_id).await?;
        if bom.approval_status != BomApprovalStatus::Approved {
            return Err(ServiceError::InvalidOperation(format!(
                "BOM {} is {} and cannot be used for production",
                bom.code,
                bom.approval_status.display_label()
            )));
        }
        if bom.product_material_id != work_order.product_material_id {
            return Err(ServiceError::InvalidInput(format!(
                "BOM {} produces material {}, not {}",
                bom.code, bom.product_material_id, work_order.product_material_id
            )));
        }

        let created = self.repos.work_orders.insert(work_order, ctx).await?;

        counter!("erp.work_orders.created", 1);
        publish(
            self.event_sender.as_ref(),
            Event::WorkOrderCreated {
                work_order_id: created.id,
                product_material_id: created.product_material_id,
                planned_quantity: created.planned_quantity,
            },
        )
        .await;
        info!(work_order_id = %created.id, number = %created.number, "Work order created");
        Ok(created)
    }

    /// Changes planning fields of an unfinished work order
    #[instrument(skip(self))]
    pub async fn update_work_order(
        &self,
        work_order_id: Uuid,
        plan: WorkOrderPlan,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let mut work_order = self.repos.work_orders.get(work_order_id).await?;
        if work_order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Work order {} is {} and can no longer be changed",
                work_order.number,
                work_order.status.display_label()
            )));
        }

        plan.apply(&mut work_order);
        ensure_valid(&work_order, &validation_context(&self.rules, ctx))?;
        let updated = self.repos.work_orders.update(work_order, ctx).await?;

        counter!("erp.work_orders.updated", 1);
        publish(self.event_sender.as_ref(), Event::WorkOrderUpdated(work_order_id)).await;
        info!(%work_order_id, "Work order updated");
        Ok(updated)
    }

    /// Applies `prepare`, checks the transition guard, then validates and
    /// stores the work order in `target` status.
    async fn transition(
        &self,
        work_order_id: Uuid,
        target: WorkOrderStatus,
        ctx: &AuditContext,
        prepare: impl FnOnce(&mut WorkOrder),
    ) -> Result<WorkOrder, ServiceError> {
        let mut work_order = self.repos.work_orders.get(work_order_id).await?;
        let old_status = work_order.status;

        prepare(&mut work_order);
        ensure_transition("WorkOrder", can_transition(&work_order, target))?;

        work_order.status = target;
        ensure_valid(&work_order, &validation_context(&self.rules, ctx))?;
        let updated = self.repos.work_orders.update(work_order, ctx).await?;

        publish(
            self.event_sender.as_ref(),
            Event::WorkOrderStatusChanged {
                work_order_id,
                old_status,
                new_status: target,
            },
        )
        .await;
        info!(%work_order_id, from = %old_status, to = %target, "Work order status changed");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn release(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let released = self
            .transition(work_order_id, WorkOrderStatus::Released, ctx, |_| {})
            .await?;
        counter!("erp.work_orders.released", 1);
        Ok(released)
    }

    /// Starts production and stamps the actual start date
    #[instrument(skip(self))]
    pub async fn start(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let now = ctx.now;
        let started = self
            .transition(work_order_id, WorkOrderStatus::InProgress, ctx, |wo| {
                if wo.can_start() {
                    wo.actual_start_date = Some(now);
                }
            })
            .await?;
        counter!("erp.work_orders.started", 1);
        Ok(started)
    }

    #[instrument(skip(self))]
    pub async fn hold(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let held = self
            .transition(work_order_id, WorkOrderStatus::OnHold, ctx, |_| {})
            .await?;
        counter!("erp.work_orders.held", 1);
        Ok(held)
    }

    #[instrument(skip(self))]
    pub async fn resume(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let resumed = self
            .transition(work_order_id, WorkOrderStatus::InProgress, ctx, |_| {})
            .await?;
        counter!("erp.work_orders.resumed", 1);
        Ok(resumed)
    }

    /// Completes a fully reported work order and stamps the actual end date
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let now = ctx.now;
        let completed = self
            .transition(work_order_id, WorkOrderStatus::Completed, ctx, |wo| {
                if wo.can_complete() {
                    wo.actual_end_date = Some(now);
                    wo.completion_percentage = Decimal::ONE_HUNDRED;
                }
            })
            .await?;
        counter!("erp.work_orders.completed", 1);
        Ok(completed)
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<WorkOrder, ServiceError> {
        let cancelled = self
            .transition(work_order_id, WorkOrderStatus::Cancelled, ctx, |_| {})
            .await?;
        counter!("erp.work_orders.cancelled", 1);
        Ok(cancelled)
    }

    /// Soft-deletes a work order without live confirmations
    #[instrument(skip(self))]
    pub async fn delete_work_order(
        &self,
        work_order_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), ServiceError> {
        self.repos.work_orders.get(work_order_id).await?;

        let has_confirmations = self
            .repos
            .confirmations
            .all_active()
            .await?
            .iter()
            .any(|c| c.work_order_id == work_order_id && c.status != ConfirmationStatus::Cancelled);
        if has_confirmations {
            return Err(ServiceError::Conflict(format!(
                "Work order {} still has production confirmations",
                work_order_id
            )));
        }

        self.repos.work_orders.soft_delete(work_order_id, ctx).await?;

        counter!("erp.work_orders.deleted", 1);
        publish(self.event_sender.as_ref(), Event::WorkOrderDeleted(work_order_id)).await;
        info!(%work_order_id, "Work order deleted");
        Ok(())
    }

    /// Work order with remaining quantity and yield
    pub async fn get_work_order(
        &self,
        work_order_id: Uuid,
    ) -> Result<WithDerived<WorkOrder, WorkOrderDerived>, ServiceError> {
        let work_order = self.repos.work_orders.get(work_order_id).await?;
        Ok(compute_derived(&work_order))
    }

    pub async fn find_by_number(&self, number: &str) -> Result<Option<WorkOrder>, ServiceError> {
        self.repos.work_orders.find_by_key("number", number).await
    }

    pub async fn list_work_orders(
        &self,
        query: &ListQuery,
    ) -> Result<Page<WorkOrder>, ServiceError> {
        let query = query.normalized(self.rules.default_page_size, self.rules.max_page_size);
        self.repos.work_orders.list(&query).await
    }
}
