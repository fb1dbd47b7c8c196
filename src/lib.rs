//! ERP Core Library
//!
//! Domain core of a manufacturing ERP: material master data, bills of
//! materials, work orders, production confirmations and user roles. The
//! crate evaluates validation rules, computes derived fields, guards status
//! transitions, maintains the material category tree and stamps audit and
//! soft-delete columns on every write.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod audit;
pub mod category_tree;
pub mod config;
pub mod derived;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod reports;
pub mod repository;
pub mod services;
pub mod validation;

use services::{
    BomService, ConfirmationService, MaterialService, Repositories, UserService, WorkOrderService,
};

/// Frequently used items.
pub mod prelude {
    pub use crate::audit::{AuditContext, AuditFields, Auditable};
    pub use crate::derived::{compute_derived, ComputeDerived, WithDerived};
    pub use crate::errors::ServiceError;
    pub use crate::lifecycle::{can_transition, StatusLifecycle, TransitionCheck};
    pub use crate::models::*;
    pub use crate::repository::{ListQuery, Page, Repository};
    pub use crate::validation::{validate, Validatable, ValidationContext, Violation, Violations};
    pub use crate::ErpServices;
}

/// All domain services over one set of repositories.
#[derive(Clone)]
pub struct ErpServices {
    pub repos: Repositories,
    pub materials: MaterialService,
    pub boms: BomService,
    pub work_orders: WorkOrderService,
    pub confirmations: ConfirmationService,
    pub users: UserService,
}

impl ErpServices {
    pub fn new(
        repos: Repositories,
        rules: config::RulesConfig,
        event_sender: Option<events::EventSender>,
    ) -> Self {
        Self {
            materials: MaterialService::new(repos.clone(), rules.clone(), event_sender.clone()),
            boms: BomService::new(repos.clone(), rules.clone(), event_sender.clone()),
            work_orders: WorkOrderService::new(repos.clone(), rules.clone(), event_sender.clone()),
            confirmations: ConfirmationService::new(
                repos.clone(),
                rules.clone(),
                event_sender.clone(),
            ),
            users: UserService::new(repos.clone(), rules, event_sender),
            repos,
        }
    }

    /// Services backed by in-memory repositories, without event publishing
    pub fn in_memory(rules: config::RulesConfig) -> Self {
        Self::new(Repositories::in_memory(), rules, None)
    }
}
