//! Persistence boundary.
//!
//! Services talk to storage only through [`Repository`]. Implementations call
//! the [`AuditInterceptor`](crate::audit::AuditInterceptor) on every write,
//! hide soft-deleted rows from every read and enforce unique business keys
//! among the rows that are still live.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditContext, Auditable};
use crate::errors::ServiceError;
use crate::models::{
    BillOfMaterial, Material, MaterialCategory, ProductionConfirmation, Role, User, UserRole,
    WorkOrder,
};

pub mod memory;

pub use memory::InMemoryRepository;

/// Storable record.
pub trait Record: Auditable + Clone + Send + Sync + 'static {
    /// Name used in error messages and logs.
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    /// Unique business keys as `(key name, value)`. Values are compared
    /// case-insensitively and ignoring surrounding whitespace.
    fn unique_keys(&self) -> Vec<(&'static str, String)>;

    /// Text matched by [`ListQuery::search`].
    fn search_text(&self) -> String;
}

pub(crate) fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Paging and search for listings. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: u64,
    pub page_size: u64,
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            search: None,
        }
    }
}

impl ListQuery {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Clamps page to at least 1 and page size into `1..=max`, using
    /// `default` when no size was given.
    pub fn normalized(&self, default: u64, max: u64) -> Self {
        let page_size = match self.page_size {
            0 => default,
            size => size,
        };
        Self {
            page: self.page.max(1),
            page_size: page_size.clamp(1, max.max(1)),
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        (self.total + self.page_size - 1) / self.page_size
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Stores a new record. Audit fields are stamped from `ctx`.
    async fn insert(&self, record: T, ctx: &AuditContext) -> Result<T, ServiceError>;

    /// Replaces a live record. Create stamps are kept from storage.
    async fn update(&self, record: T, ctx: &AuditContext) -> Result<T, ServiceError>;

    /// Live record by id.
    async fn find(&self, id: Uuid) -> Result<Option<T>, ServiceError>;

    async fn get(&self, id: Uuid) -> Result<T, ServiceError> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(T::KIND, id))
    }

    /// Live record holding `value` for the unique key `key`.
    async fn find_by_key(&self, key: &str, value: &str) -> Result<Option<T>, ServiceError>;

    /// Live records, newest first.
    async fn list(&self, query: &ListQuery) -> Result<Page<T>, ServiceError>;

    /// Every live record, newest first.
    async fn all_active(&self) -> Result<Vec<T>, ServiceError>;

    /// Flags the record deleted and frees its unique keys.
    async fn soft_delete(&self, id: Uuid, ctx: &AuditContext) -> Result<T, ServiceError>;
}

impl Record for MaterialCategory {
    const KIND: &'static str = "MaterialCategory";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("code", self.code.clone())]
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.code, self.name)
    }
}

impl Record for Material {
    const KIND: &'static str = "Material";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("code", self.code.clone())]
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.code,
            self.name,
            self.description.as_deref().unwrap_or_default()
        )
    }
}

impl Record for BillOfMaterial {
    const KIND: &'static str = "BillOfMaterial";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("code", self.code.clone())]
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.code, self.name, self.version)
    }
}

impl Record for WorkOrder {
    const KIND: &'static str = "WorkOrder";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("number", self.number.clone())]
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.number, self.status)
    }
}

impl Record for ProductionConfirmation {
    const KIND: &'static str = "ProductionConfirmation";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("number", self.number.clone())]
    }

    fn search_text(&self) -> String {
        format!("{} {}", self.number, self.status)
    }
}

impl Record for User {
    const KIND: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.username.clone()),
            ("email", self.email.clone()),
        ]
    }

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.username,
            self.email,
            self.full_name().unwrap_or_default()
        )
    }
}

impl Record for Role {
    const KIND: &'static str = "Role";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("name", self.name.clone())]
    }

    fn search_text(&self) -> String {
        self.name.clone()
    }
}

/// Key of a user/role pair.
pub fn assignment_key(user_id: Uuid, role_id: Uuid) -> String {
    format!("{}:{}", user_id, role_id)
}

impl Record for UserRole {
    const KIND: &'static str = "UserRole";

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("assignment", assignment_key(self.user_id, self.role_id))]
    }

    fn search_text(&self) -> String {
        assignment_key(self.user_id, self.role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_query_clamps_paging() {
        let query = ListQuery::new(0, 500).with_search("  ");
        let normalized = query.normalized(20, 100);
        assert_eq!(normalized.page, 1);
        assert_eq!(normalized.page_size, 100);
        assert_eq!(normalized.search, None);

        assert_eq!(ListQuery::new(2, 0).normalized(20, 100).page_size, 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 41,
            page: 1,
            page_size: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
