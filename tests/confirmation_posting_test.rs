//! Production confirmations: DRAFT -> CONFIRMED -> POSTED, and what posting
//! does to the work order.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{at, operator, seed_catalog, services, started_work_order, supervisor, t0};
use erp_core::{
    audit::AuditContext,
    config::RulesConfig,
    errors::ServiceError,
    models::{ConfirmationStatus, ProductionConfirmation, QualityStatus, WorkOrder},
    repository::{InMemoryRepository, ListQuery, Page, Repository},
    services::Repositories,
    validation::{
        codes, confirmation::DATE_IN_FUTURE, work_order::COMPLETED_PLUS_SCRAP_EXCEEDS_PLANNED,
    },
    ErpServices,
};
use uuid::Uuid;

fn confirmation(
    wo: &WorkOrder,
    number: &str,
    good: Decimal,
    scrap: Decimal,
) -> ProductionConfirmation {
    let mut pc = ProductionConfirmation::new(number, wo.id, t0() + Duration::minutes(4), good)
        .with_times(dec!(15), dec!(45), dec!(0));
    pc.scrap_quantity = scrap;
    pc
}

async fn confirmed(svc: &ErpServices, pc: ProductionConfirmation) -> ProductionConfirmation {
    let pc = svc.confirmations.create_confirmation(pc, &at(5)).await.unwrap();
    svc.confirmations
        .confirm(pc.id, operator(), supervisor(), &at(6))
        .await
        .unwrap()
}

#[tokio::test]
async fn posting_accumulates_into_the_work_order() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(100)).await;

    let first = confirmed(&svc, confirmation(&wo, "PC-1", dec!(40), dec!(5))).await;
    assert_eq!(first.status, ConfirmationStatus::Confirmed);
    assert_eq!(first.operator_user_id, Some(operator()));
    assert_eq!(first.confirmed_by_user_id, Some(supervisor()));
    assert_eq!(first.confirmed_date, Some(at(6).now));

    let posted = svc.confirmations.post(first.id, &at(7)).await.unwrap();
    assert_eq!(posted.status, ConfirmationStatus::Posted);

    let second = confirmed(&svc, confirmation(&wo, "PC-2", dec!(25), dec!(0))).await;
    svc.confirmations.post(second.id, &at(8)).await.unwrap();

    let view = svc.work_orders.get_work_order(wo.id).await.unwrap();
    assert_eq!(view.entity.completed_quantity, dec!(65));
    assert_eq!(view.entity.scrap_quantity, dec!(5));
    assert_eq!(view.entity.completion_percentage, dec!(70));
    assert_eq!(view.derived.remaining_quantity, dec!(30));

    let summary = svc.confirmations.production_summary(wo.id).await.unwrap();
    assert_eq!(summary.confirmation_count, 2);
    assert_eq!(summary.total_confirmed, dec!(65));
    assert_eq!(summary.total_scrap, dec!(5));
    assert_eq!(summary.total_run_time, dec!(90));
    assert_eq!(summary.efficiency_percentage, Some(dec!(75)));
}

#[tokio::test]
async fn over_reporting_post_writes_nothing() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(10)).await;

    let pc = confirmed(&svc, confirmation(&wo, "PC-OVER", dec!(9), dec!(2))).await;
    let before = svc.work_orders.get_work_order(wo.id).await.unwrap().entity;

    let err = svc.confirmations.post(pc.id, &at(7)).await.unwrap_err();
    assert!(err
        .violations()
        .is_some_and(|v| v.has_rule(COMPLETED_PLUS_SCRAP_EXCEEDS_PLANNED)));

    let after = svc.work_orders.get_work_order(wo.id).await.unwrap().entity;
    assert_eq!(after, before);
    let stored = svc.confirmations.get_confirmation(pc.id).await.unwrap().entity;
    assert_eq!(stored.status, ConfirmationStatus::Confirmed);
}

#[tokio::test]
async fn draft_cannot_be_posted_directly() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(10)).await;

    let pc = svc
        .confirmations
        .create_confirmation(confirmation(&wo, "PC-D", dec!(1), dec!(0)), &at(5))
        .await
        .unwrap();
    let err = svc.confirmations.post(pc.id, &at(6)).await.unwrap_err();
    assert!(err
        .violations()
        .is_some_and(|v| v.has_rule(codes::INVALID_STATUS_TRANSITION)));
}

#[tokio::test]
async fn confirmations_need_a_running_work_order() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = WorkOrder::new("WO-3000", catalog.bom.id, catalog.product.id, dec!(10));
    let wo = svc.work_orders.create_work_order(wo, &at(1)).await.unwrap();

    assert_matches!(
        svc.confirmations
            .create_confirmation(confirmation(&wo, "PC-X", dec!(1), dec!(0)), &at(5))
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn confirmation_rules_are_reported_together() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(10)).await;

    let mut pc = ProductionConfirmation::new("PC-BAD", wo.id, t0() + Duration::days(1), dec!(0));
    pc.quality_status = QualityStatus::Failed;

    let err = svc
        .confirmations
        .create_confirmation(pc, &at(5))
        .await
        .unwrap_err();
    let violations = err.violations().expect("validation error");
    let rules = violations.rules();
    assert!(rules.contains(&DATE_IN_FUTURE));
    assert!(rules.contains(&"TotalQuantityMustBeGreaterThanZero"));
    assert!(violations.for_field("quality_notes").next().is_some());
}

#[tokio::test]
async fn only_drafts_are_editable_and_posted_ones_stay() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(10)).await;

    let draft = svc
        .confirmations
        .create_confirmation(confirmation(&wo, "PC-E", dec!(2), dec!(0)), &at(5))
        .await
        .unwrap();
    let mut edited = draft.clone();
    edited.rework_quantity = dec!(1);
    let edited = svc
        .confirmations
        .update_confirmation(edited, &at(6))
        .await
        .unwrap();
    assert_eq!(edited.rework_quantity, dec!(1));
    assert_eq!(edited.audit.create_date, at(5).now);

    let posted = confirmed(&svc, confirmation(&wo, "PC-P", dec!(3), dec!(0))).await;
    let posted = svc.confirmations.post(posted.id, &at(7)).await.unwrap();

    let mut late_edit = posted.clone();
    late_edit.confirmed_quantity = dec!(4);
    assert_matches!(
        svc.confirmations.update_confirmation(late_edit, &at(8)).await,
        Err(ServiceError::InvalidOperation(_))
    );
    assert_matches!(
        svc.confirmations.delete_confirmation(posted.id, &at(8)).await,
        Err(ServiceError::InvalidOperation(_))
    );
    assert_matches!(
        svc.confirmations.cancel(posted.id, &at(8)).await,
        Err(ServiceError::Validation(_))
    );

    svc.confirmations.delete_confirmation(draft.id, &at(9)).await.unwrap();
    let remaining = svc.confirmations.list_for_work_order(wo.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, posted.id);
}

#[tokio::test]
async fn derived_fields_of_a_confirmation() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(100)).await;

    let mut pc = confirmation(&wo, "PC-V", dec!(80), dec!(15));
    pc.rework_quantity = dec!(5);
    let pc = svc.confirmations.create_confirmation(pc, &at(5)).await.unwrap();

    let view = svc.confirmations.get_confirmation(pc.id).await.unwrap();
    assert_eq!(view.derived.total_quantity, dec!(100));
    assert_eq!(view.derived.total_time, dec!(60));
    assert_eq!(view.derived.efficiency_percentage, Some(dec!(75)));
    assert_eq!(view.derived.yield_percentage, dec!(80));
    assert_eq!(view.derived.scrap_percentage, dec!(15));
    assert_eq!(view.derived.rework_percentage, dec!(5));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["number"], "PC-V");
    assert!(json.get("total_quantity").is_some());
}

#[tokio::test]
async fn confirmed_record_keeps_its_people_through_json() {
    let svc = services();
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(10)).await;
    let pc = confirmed(&svc, confirmation(&wo, "PC-J", dec!(1), dec!(0))).await;

    let json = serde_json::to_string(&pc).unwrap();
    assert!(json.contains("\"CONFIRMED\""));
    let parsed: ProductionConfirmation = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, pc);
    assert!(parsed.operator_user_id.is_some());
    assert!(parsed.confirmed_by_user_id.is_some());
    assert!(parsed.confirmed_date.is_some());
}

/// Confirmation store whose writes fail once a record is POSTED.
#[derive(Default)]
struct PostingUnavailable {
    inner: InMemoryRepository<ProductionConfirmation>,
}

#[async_trait]
impl Repository<ProductionConfirmation> for PostingUnavailable {
    async fn insert(
        &self,
        record: ProductionConfirmation,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        self.inner.insert(record, ctx).await
    }

    async fn update(
        &self,
        record: ProductionConfirmation,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        if record.status == ConfirmationStatus::Posted {
            return Err(ServiceError::InternalError("storage unavailable".into()));
        }
        self.inner.update(record, ctx).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<ProductionConfirmation>, ServiceError> {
        self.inner.find(id).await
    }

    async fn find_by_key(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Option<ProductionConfirmation>, ServiceError> {
        self.inner.find_by_key(key, value).await
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<ProductionConfirmation>, ServiceError> {
        self.inner.list(query).await
    }

    async fn all_active(&self) -> Result<Vec<ProductionConfirmation>, ServiceError> {
        self.inner.all_active().await
    }

    async fn soft_delete(
        &self,
        id: Uuid,
        ctx: &AuditContext,
    ) -> Result<ProductionConfirmation, ServiceError> {
        self.inner.soft_delete(id, ctx).await
    }
}

#[tokio::test]
async fn failed_confirmation_write_leaves_work_order_unchanged() {
    let repos = Repositories {
        confirmations: Arc::new(PostingUnavailable::default()),
        ..Repositories::in_memory()
    };
    let svc = ErpServices::new(repos, RulesConfig::default(), None);
    let catalog = seed_catalog(&svc).await;
    let wo = started_work_order(&svc, &catalog, dec!(10)).await;
    let pc = confirmed(&svc, confirmation(&wo, "PC-F", dec!(4), dec!(1))).await;

    assert_matches!(
        svc.confirmations.post(pc.id, &at(7)).await,
        Err(ServiceError::InternalError(_))
    );

    let stored = svc.work_orders.get_work_order(wo.id).await.unwrap().entity;
    assert_eq!(stored.completed_quantity, wo.completed_quantity);
    assert_eq!(stored.scrap_quantity, wo.scrap_quantity);
    assert_eq!(stored.completion_percentage, wo.completion_percentage);
    let pc = svc.confirmations.get_confirmation(pc.id).await.unwrap().entity;
    assert_eq!(pc.status, ConfirmationStatus::Confirmed);
}
