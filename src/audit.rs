//! Audit stamping and soft delete.
//!
//! Every record embeds [`AuditFields`] as plain data. Only the
//! [`AuditInterceptor`] writes them, and only the persistence layer calls the
//! interceptor, so domain code never touches create/update/delete stamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit and soft-delete columns shared by every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub create_date: DateTime<Utc>,
    pub create_user_id: Option<Uuid>,
    pub update_date: Option<DateTime<Utc>>,
    pub update_user_id: Option<Uuid>,
    pub is_deleted: bool,
    pub delete_date: Option<DateTime<Utc>>,
    pub delete_user_id: Option<Uuid>,
}

impl Default for AuditFields {
    fn default() -> Self {
        Self {
            create_date: Utc::now(),
            create_user_id: None,
            update_date: None,
            update_user_id: None,
            is_deleted: false,
            delete_date: None,
            delete_user_id: None,
        }
    }
}

/// Records carrying [`AuditFields`].
pub trait Auditable {
    fn audit(&self) -> &AuditFields;
    fn audit_mut(&mut self) -> &mut AuditFields;

    fn is_deleted(&self) -> bool {
        self.audit().is_deleted
    }
}

macro_rules! impl_auditable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::audit::Auditable for $ty {
                fn audit(&self) -> &$crate::audit::AuditFields {
                    &self.audit
                }

                fn audit_mut(&mut self) -> &mut $crate::audit::AuditFields {
                    &mut self.audit
                }
            }
        )+
    };
}

pub(crate) use impl_auditable;

/// Who performs a write and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditContext {
    pub user_id: Option<Uuid>,
    pub now: DateTime<Utc>,
}

impl AuditContext {
    pub fn new(user_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            now: Utc::now(),
        }
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self::new(Some(user_id))
    }

    /// Writes performed by the system itself (imports, background jobs).
    pub fn system() -> Self {
        Self::new(None)
    }

    pub fn at(user_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        Self { user_id, now }
    }
}

/// Stamps audit columns on every write at the persistence boundary.
pub struct AuditInterceptor;

impl AuditInterceptor {
    pub fn on_insert<T: Auditable>(record: &mut T, ctx: &AuditContext) {
        *record.audit_mut() = AuditFields {
            create_date: ctx.now,
            create_user_id: ctx.user_id,
            update_date: None,
            update_user_id: None,
            is_deleted: false,
            delete_date: None,
            delete_user_id: None,
        };
    }

    /// `stored` is the audit state currently persisted; create and delete
    /// stamps always come from there, whatever the caller sent.
    pub fn on_update<T: Auditable>(record: &mut T, stored: &AuditFields, ctx: &AuditContext) {
        let audit = record.audit_mut();
        *audit = stored.clone();
        audit.update_date = Some(ctx.now);
        audit.update_user_id = ctx.user_id;
    }

    pub fn on_delete<T: Auditable>(record: &mut T, ctx: &AuditContext) {
        let audit = record.audit_mut();
        audit.is_deleted = true;
        audit.delete_date = Some(ctx.now);
        audit.delete_user_id = ctx.user_id;
        audit.update_date = Some(ctx.now);
        audit.update_user_id = ctx.user_id;
    }
}
