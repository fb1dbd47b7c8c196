//! Records of the manufacturing domain.
//!
//! Records are plain data: identifiers, business fields and the embedded
//! [`AuditFields`](crate::audit::AuditFields). Behaviour lives in the
//! validation, derived-field and lifecycle modules.

pub mod bill_of_material;
pub mod identity;
pub mod material;
pub mod production_confirmation;
pub mod work_order;

pub use bill_of_material::{
    BillOfMaterial, BillOfMaterialItem, BomApprovalStatus, ComponentType, IssueMethod,
};
pub use identity::{Role, User, UserRole};
pub use material::{Material, MaterialCategory, MaterialType};
pub use production_confirmation::{ConfirmationStatus, ProductionConfirmation, QualityStatus};
pub use work_order::{WorkOrder, WorkOrderStatus};

pub(crate) fn default_true() -> bool {
    true
}
