use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use crate::audit::AuditContext;
use crate::config::RulesConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::lifecycle::TransitionCheck;
use crate::models::{
    BillOfMaterial, Material, MaterialCategory, ProductionConfirmation, Role, User, UserRole,
    WorkOrder,
};
use crate::repository::{InMemoryRepository, Record, Repository};
use crate::validation::{Validatable, ValidationContext};

pub mod bom;
pub mod confirmations;
pub mod materials;
pub mod users;
pub mod work_orders;

pub use bom::BomService;
pub use confirmations::ConfirmationService;
pub use materials::MaterialService;
pub use users::UserService;
pub use work_orders::{WorkOrderPlan, WorkOrderService};

/// Storage handles shared by all services.
#[derive(Clone)]
pub struct Repositories {
    pub categories: Arc<dyn Repository<MaterialCategory>>,
    pub materials: Arc<dyn Repository<Material>>,
    pub boms: Arc<dyn Repository<BillOfMaterial>>,
    pub work_orders: Arc<dyn Repository<WorkOrder>>,
    pub confirmations: Arc<dyn Repository<ProductionConfirmation>>,
    pub users: Arc<dyn Repository<User>>,
    pub roles: Arc<dyn Repository<Role>>,
    pub user_roles: Arc<dyn Repository<UserRole>>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            categories: Arc::new(InMemoryRepository::new()),
            materials: Arc::new(InMemoryRepository::new()),
            boms: Arc::new(InMemoryRepository::new()),
            work_orders: Arc::new(InMemoryRepository::new()),
            confirmations: Arc::new(InMemoryRepository::new()),
            users: Arc::new(InMemoryRepository::new()),
            roles: Arc::new(InMemoryRepository::new()),
            user_roles: Arc::new(InMemoryRepository::new()),
        }
    }
}

/// Rule context for a write performed at `ctx.now`.
pub(crate) fn validation_context(rules: &RulesConfig, ctx: &AuditContext) -> ValidationContext {
    ValidationContext {
        now: ctx.now,
        ..ValidationContext::from_rules(rules)
    }
}

/// Runs the record's rule set and turns violations into an error.
pub(crate) fn ensure_valid<T>(record: &T, vctx: &ValidationContext) -> Result<(), ServiceError>
where
    T: Validatable + Record,
{
    let violations = record.validate_with(vctx);
    if violations.is_empty() {
        return Ok(());
    }

    warn!(kind = T::KIND, id = %record.id(), %violations, "Validation failed");
    counter!("erp.validation.rejected", 1);
    Err(ServiceError::Validation(violations))
}

pub(crate) fn ensure_transition(kind: &str, check: TransitionCheck) -> Result<(), ServiceError> {
    if check.is_permitted() {
        return Ok(());
    }

    warn!(
        kind,
        from = %check.from,
        to = %check.to,
        "Status transition rejected"
    );
    counter!("erp.transitions.rejected", 1);
    Err(ServiceError::Validation(check.into_violations()))
}

pub(crate) async fn publish(sender: Option<&EventSender>, event: Event) {
    if let Some(sender) = sender {
        sender.send_or_log(event).await;
    }
}
