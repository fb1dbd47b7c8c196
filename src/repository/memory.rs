use std::cmp::Reverse;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::{normalize_key, ListQuery, Page, Record, Repository};
use crate::audit::{AuditContext, AuditInterceptor};
use crate::errors::ServiceError;

type KeySlot = (&'static str, String);

/// Concurrent in-process store. Rows stay in the map after a soft delete;
/// only their unique keys are released.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    rows: DashMap<Uuid, T>,
    keys: DashMap<KeySlot, Uuid>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            keys: DashMap::new(),
        }
    }
}

fn slots<T: Record>(record: &T) -> Vec<KeySlot> {
    record
        .unique_keys()
        .into_iter()
        .map(|(name, value)| (name, normalize_key(&value)))
        .collect()
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows including soft-deleted ones.
    pub fn stored_len(&self) -> usize {
        self.rows.len()
    }

    /// Claims every slot for `id`, or none of them.
    fn reserve(&self, id: Uuid, slots: &[KeySlot]) -> Result<(), ServiceError> {
        let mut claimed: Vec<KeySlot> = Vec::new();

        for slot in slots {
            let clash = match self.keys.entry(slot.clone()) {
                Entry::Occupied(entry) => *entry.get() != id,
                Entry::Vacant(entry) => {
                    entry.insert(id);
                    claimed.push(slot.clone());
                    false
                }
            };

            if clash {
                for taken in &claimed {
                    self.keys.remove(taken);
                }
                return Err(ServiceError::Conflict(format!(
                    "{} with {} '{}' already exists",
                    T::KIND,
                    slot.0,
                    slot.1
                )));
            }
        }
        Ok(())
    }

    fn release(&self, id: Uuid, slots: &[KeySlot]) {
        for slot in slots {
            self.keys.remove_if(slot, |_, owner| *owner == id);
        }
    }

    fn live(&self) -> Vec<T> {
        let mut rows: Vec<T> = self
            .rows
            .iter()
            .filter(|row| !row.value().audit().is_deleted)
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| (Reverse(row.audit().create_date), row.id()));
        rows
    }
}

#[async_trait]
impl<T: Record> Repository<T> for InMemoryRepository<T> {
    async fn insert(&self, mut record: T, ctx: &AuditContext) -> Result<T, ServiceError> {
        let id = record.id();
        if self.rows.contains_key(&id) {
            return Err(ServiceError::Conflict(format!(
                "{} with ID {} already exists",
                T::KIND,
                id
            )));
        }

        AuditInterceptor::on_insert(&mut record, ctx);
        self.reserve(id, &slots(&record))?;
        self.rows.insert(id, record.clone());

        debug!(kind = T::KIND, %id, "Inserted record");
        Ok(record)
    }

    async fn update(&self, mut record: T, ctx: &AuditContext) -> Result<T, ServiceError> {
        let id = record.id();
        let stored = self
            .rows
            .get(&id)
            .map(|row| row.value().clone())
            .filter(|row| !row.audit().is_deleted)
            .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;

        AuditInterceptor::on_update(&mut record, stored.audit(), ctx);

        let new_slots = slots(&record);
        self.reserve(id, &new_slots)?;
        let stale: Vec<KeySlot> = slots(&stored)
            .into_iter()
            .filter(|slot| !new_slots.contains(slot))
            .collect();
        self.release(id, &stale);

        self.rows.insert(id, record.clone());
        debug!(kind = T::KIND, %id, "Updated record");
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<T>, ServiceError> {
        Ok(self
            .rows
            .get(&id)
            .map(|row| row.value().clone())
            .filter(|row| !row.audit().is_deleted))
    }

    async fn find_by_key(&self, key: &str, value: &str) -> Result<Option<T>, ServiceError> {
        let wanted = normalize_key(value);
        let owner = self
            .keys
            .iter()
            .find(|slot| slot.key().0 == key && slot.key().1 == wanted)
            .map(|slot| *slot.value());

        match owner {
            Some(id) => self.find(id).await,
            None => Ok(None),
        }
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<T>, ServiceError> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let matching: Vec<T> = self
            .live()
            .into_iter()
            .filter(|row| {
                needle
                    .as_ref()
                    .map_or(true, |n| row.search_text().to_lowercase().contains(n.as_str()))
            })
            .collect();

        let page = query.page.max(1);
        let page_size = query.page_size.max(1);
        let skip = usize::try_from((page - 1).saturating_mul(page_size)).unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(usize::MAX);

        Ok(Page {
            total: matching.len() as u64,
            items: matching.into_iter().skip(skip).take(take).collect(),
            page,
            page_size,
        })
    }

    async fn all_active(&self) -> Result<Vec<T>, ServiceError> {
        Ok(self.live())
    }

    async fn soft_delete(&self, id: Uuid, ctx: &AuditContext) -> Result<T, ServiceError> {
        let deleted = {
            let mut row = self
                .rows
                .get_mut(&id)
                .filter(|row| !row.audit().is_deleted)
                .ok_or_else(|| ServiceError::not_found(T::KIND, id))?;
            AuditInterceptor::on_delete(row.value_mut(), ctx);
            row.value().clone()
        };

        self.release(id, &slots(&deleted));
        debug!(kind = T::KIND, %id, "Soft-deleted record");
        Ok(deleted)
    }
}
