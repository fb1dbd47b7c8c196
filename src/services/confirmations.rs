use metrics::counter;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{ensure_transition, ensure_valid, publish, validation_context, Repositories};
use crate::audit::AuditContext;
use crate::config::RulesConfig;
use crate::derived::{compute_derived, percentage, ConfirmationDerived, WithDerived};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::lifecycle::can_transition;
use crate::models::{ConfirmationStatus, ProductionConfirmation, WorkOrder, WorkOrderStatus};
use crate::reports::ProductionSummary;

/// Production confirmations and their posting into work order totals.
#[derive(Clone)]
pub struct ConfirmationService {
    repos: Repositories,
    rules: RulesConfig,
    event_sender: Option<EventSender>,
}

impl ConfirmationService {
    pub fn new(repos: Repositories, rules: RulesConfig, event_sender: Option<EventSender>) -> Self {
        Self {
            repos,
            rules,
            event_sender,
        }
    }

    async fn draft(&self, confirmation_id: Uuid) -> Result<ProductionConfirmation, ServiceError> {
        let confirmation = self.repos.confirmations.get(confirmation_id).await?;
        if confirmation.status != ConfirmationStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "Confirmation {} is {} and can no longer be changed",
                confirmation.number,
                confirmation.status.display_label()
            )));
        }
        Ok(confirmation)
    }

    /// Records a DRAFT confirmation against a work order in progress
    #[instrument(skip(self, confirmation), fields(number = %confirmation.number))]
    pub async fn create_confirmation(
        &self,
        confirmation: ProductionConfirmation,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        if confirmation.status != ConfirmationStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "A new confirmation must start as DRAFT, got {}",
                confirmation.status
            )));
        }
        ensure_valid(&confirmation, &validation_context(&self.rules, ctx))?;

        let work_order = self.repos.work_orders.get(confirmation.work_order_id).await?;
        if work_order.status != WorkOrderStatus::InProgress {
            return Err(ServiceError::InvalidOperation(format!(
                "Work order {} is {}; output can only be confirmed while in progress",
                work_order.number,
                work_order.status.display_label()
            )));
        }

        let created = self.repos.confirmations.insert(confirmation, ctx).await?;

        counter!("erp.confirmations.created", 1);
        publish(
            self.event_sender.as_ref(),
            Event::ConfirmationCreated {
                confirmation_id: created.id,
                work_order_id: created.work_order_id,
            },
        )
        .await;
        info!(
            confirmation_id = %created.id,
            work_order_id = %created.work_order_id,
            "Confirmation created"
        );
        Ok(created)
    }

    /// Replaces a DRAFT confirmation. It stays DRAFT and on the same work order.
    #[instrument(skip(self, confirmation), fields(confirmation_id = %confirmation.id))]
    pub async fn update_confirmation(
        &self,
        mut confirmation: ProductionConfirmation,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        let stored = self.draft(confirmation.id).await?;
        if stored.work_order_id != confirmation.work_order_id {
            return Err(ServiceError::InvalidOperation(
                "A confirmation cannot be moved to another work order".to_string(),
            ));
        }
        confirmation.status = ConfirmationStatus::Draft;
        ensure_valid(&confirmation, &validation_context(&self.rules, ctx))?;

        let updated = self.repos.confirmations.update(confirmation, ctx).await?;

        counter!("erp.confirmations.updated", 1);
        publish(self.event_sender.as_ref(), Event::ConfirmationUpdated(updated.id)).await;
        info!(confirmation_id = %updated.id, "Confirmation updated");
        Ok(updated)
    }

    async fn change_status(
        &self,
        mut confirmation: ProductionConfirmation,
        target: ConfirmationStatus,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        let old_status = confirmation.status;
        ensure_transition("ProductionConfirmation", can_transition(&confirmation, target))?;

        confirmation.status = target;
        ensure_valid(&confirmation, &validation_context(&self.rules, ctx))?;
        let updated = self.repos.confirmations.update(confirmation, ctx).await?;

        publish(
            self.event_sender.as_ref(),
            Event::ConfirmationStatusChanged {
                confirmation_id: updated.id,
                old_status,
                new_status: target,
            },
        )
        .await;
        info!(
            confirmation_id = %updated.id,
            from = %old_status,
            to = %target,
            "Confirmation status changed"
        );
        Ok(updated)
    }

    /// Confirms a DRAFT, recording operator and confirming user
    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        confirmation_id: Uuid,
        operator_user_id: Uuid,
        confirmed_by_user_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        let mut confirmation = self.draft(confirmation_id).await?;
        confirmation.operator_user_id = Some(operator_user_id);
        confirmation.confirmed_by_user_id = Some(confirmed_by_user_id);
        confirmation.confirmed_date = Some(ctx.now);

        let confirmed = self
            .change_status(confirmation, ConfirmationStatus::Confirmed, ctx)
            .await?;
        counter!("erp.confirmations.confirmed", 1);
        Ok(confirmed)
    }

    /// Posts a CONFIRMED confirmation into its work order's completed and
    /// scrap quantities. Nothing is written when the work order would no
    /// longer validate.
    #[instrument(skip(self))]
    pub async fn post(
        &self,
        confirmation_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        let confirmation = self.repos.confirmations.get(confirmation_id).await?;
        ensure_transition(
            "ProductionConfirmation",
            can_transition(&confirmation, ConfirmationStatus::Posted),
        )?;

        let mut work_order = self.repos.work_orders.get(confirmation.work_order_id).await?;
        if work_order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Work order {} is {} and accepts no more output",
                work_order.number,
                work_order.status.display_label()
            )));
        }

        let original_work_order = work_order.clone();
        // Saturated totals fail the over-reporting rule below.
        work_order.completed_quantity = work_order
            .completed_quantity
            .saturating_add(confirmation.confirmed_quantity);
        work_order.scrap_quantity = work_order
            .scrap_quantity
            .saturating_add(confirmation.scrap_quantity);
        work_order.completion_percentage = percentage(
            work_order.reported_quantity().unwrap_or(Decimal::MAX),
            work_order.planned_quantity,
        )
        .min(Decimal::ONE_HUNDRED);

        let vctx = validation_context(&self.rules, ctx);
        if let Err(e) = ensure_valid(&work_order, &vctx) {
            warn!(%confirmation_id, work_order_id = %work_order.id, "Posting rejected");
            counter!("erp.confirmations.post_rejected", 1);
            return Err(e);
        }

        let mut posted = confirmation.clone();
        posted.status = ConfirmationStatus::Posted;
        ensure_valid(&posted, &vctx)?;

        let work_order = self.repos.work_orders.update(work_order, ctx).await?;
        let posted = match self.repos.confirmations.update(posted, ctx).await {
            Ok(posted) => posted,
            Err(e) => {
                warn!(%confirmation_id, error = %e, "Posting failed, restoring work order");
                self.restore_work_order(original_work_order, ctx).await?;
                return Err(e);
            }
        };

        counter!("erp.confirmations.posted", 1);
        publish(
            self.event_sender.as_ref(),
            Event::ConfirmationStatusChanged {
                confirmation_id,
                old_status: confirmation.status,
                new_status: ConfirmationStatus::Posted,
            },
        )
        .await;
        publish(
            self.event_sender.as_ref(),
            Event::ConfirmationPosted {
                confirmation_id,
                work_order_id: work_order.id,
                confirmed_quantity: posted.confirmed_quantity,
                scrap_quantity: posted.scrap_quantity,
            },
        )
        .await;
        info!(
            %confirmation_id,
            work_order_id = %work_order.id,
            completed = %work_order.completed_quantity,
            "Confirmation posted"
        );
        Ok(posted)
    }

    async fn restore_work_order(
        &self,
        work_order: WorkOrder,
        ctx: &AuditContext,
    ) -> Result<(), ServiceError> {
        let work_order_id = work_order.id;
        self.repos
            .work_orders
            .update(work_order, ctx)
            .await
            .map(|_| ())
            .map_err(|e| {
                error!(%work_order_id, error = %e, "Work order left with unposted output");
                counter!("erp.confirmations.post_restore_failed", 1);
                ServiceError::InternalError(format!(
                    "Work order {} could not be restored after a failed posting: {}",
                    work_order_id, e
                ))
            })
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        confirmation_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        let confirmation = self.repos.confirmations.get(confirmation_id).await?;
        let cancelled = self
            .change_status(confirmation, ConfirmationStatus::Cancelled, ctx)
            .await?;
        counter!("erp.confirmations.cancelled", 1);
        Ok(cancelled)
    }

    /// Soft-deletes a confirmation that has not been posted
    #[instrument(skip(self))]
    pub async fn delete_confirmation(
        &self,
        confirmation_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), ServiceError> {
        let confirmation = self.repos.confirmations.get(confirmation_id).await?;
        if confirmation.status == ConfirmationStatus::Posted {
            return Err(ServiceError::InvalidOperation(format!(
                "Confirmation {} is posted and cannot be deleted",
                confirmation.number
            )));
        }

        self.repos.confirmations.soft_delete(confirmation_id, ctx).await?;

        counter!("erp.confirmations.deleted", 1);
        publish(self.event_sender.as_ref(), Event::ConfirmationDeleted(confirmation_id)).await;
        info!(%confirmation_id, "Confirmation deleted");
        Ok(())
    }

    /// Confirmation with totals and percentages
    pub async fn get_confirmation(
        &self,
        confirmation_id: Uuid,
    ) -> Result<WithDerived<ProductionConfirmation, ConfirmationDerived>, ServiceError> {
        let confirmation = self.repos.confirmations.get(confirmation_id).await?;
        Ok(compute_derived(&confirmation))
    }

    /// Live confirmations of a work order, newest first
    pub async fn list_for_work_order(
        &self,
        work_order_id: Uuid,
    ) -> Result<Vec<ProductionConfirmation>, ServiceError> {
        Ok(self
            .repos
            .confirmations
            .all_active()
            .await?
            .into_iter()
            .filter(|c| c.work_order_id == work_order_id)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn production_summary(
        &self,
        work_order_id: Uuid,
    ) -> Result<ProductionSummary, ServiceError> {
        let work_order = self.repos.work_orders.get(work_order_id).await?;
        let confirmations = self.list_for_work_order(work_order_id).await?;
        Ok(ProductionSummary::build(&work_order, &confirmations))
    }
}
