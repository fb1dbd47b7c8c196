use metrics::counter;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{ensure_valid, publish, validation_context, Repositories};
use crate::audit::AuditContext;
use crate::category_tree::{CategoryIndex, CategoryNode};
use crate::config::RulesConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Material, MaterialCategory};
use crate::repository::{ListQuery, Page};

/// Material cards and the category tree they hang in.
#[derive(Clone)]
pub struct MaterialService {
    repos: Repositories,
    rules: RulesConfig,
    event_sender: Option<EventSender>,
}

impl MaterialService {
    pub fn new(repos: Repositories, rules: RulesConfig, event_sender: Option<EventSender>) -> Self {
        Self {
            repos,
            rules,
            event_sender,
        }
    }

    async fn category_index(&self) -> Result<CategoryIndex, ServiceError> {
        let categories = self.repos.categories.all_active().await?;
        Ok(CategoryIndex::from_categories(&categories)?)
    }

    /// Creates a category under an existing parent, or as a root
    #[instrument(skip(self, category), fields(code = %category.code))]
    pub async fn create_category(
        &self,
        category: MaterialCategory,
        ctx: &AuditContext,
    ) -> Result<MaterialCategory, ServiceError> {
        ensure_valid(&category, &validation_context(&self.rules, ctx))?;

        let mut index = self.category_index().await?;
        index.insert(CategoryNode::from(&category), self.rules.max_category_depth)?;

        let created = self.repos.categories.insert(category, ctx).await?;

        counter!("erp.categories.created", 1);
        publish(self.event_sender.as_ref(), Event::CategoryCreated(created.id)).await;
        info!(category_id = %created.id, "Material category created");
        Ok(created)
    }

    /// Updates a category; a changed parent goes through the same checks as a move
    #[instrument(skip(self, category), fields(category_id = %category.id))]
    pub async fn update_category(
        &self,
        category: MaterialCategory,
        ctx: &AuditContext,
    ) -> Result<MaterialCategory, ServiceError> {
        let stored = self.repos.categories.get(category.id).await?;
        ensure_valid(&category, &validation_context(&self.rules, ctx))?;

        let moved = stored.parent_id != category.parent_id;
        if moved {
            let mut index = self.category_index().await?;
            index.reparent(category.id, category.parent_id, self.rules.max_category_depth)?;
        }

        let updated = self.repos.categories.update(category, ctx).await?;

        publish(self.event_sender.as_ref(), Event::CategoryUpdated(updated.id)).await;
        if moved {
            publish(
                self.event_sender.as_ref(),
                Event::CategoryMoved {
                    category_id: updated.id,
                    old_parent_id: stored.parent_id,
                    new_parent_id: updated.parent_id,
                },
            )
            .await;
        }
        info!(category_id = %updated.id, "Material category updated");
        Ok(updated)
    }

    /// Moves a category (and its subtree) under a new parent, or to the root level
    #[instrument(skip(self))]
    pub async fn move_category(
        &self,
        category_id: Uuid,
        new_parent_id: Option<Uuid>,
        ctx: &AuditContext,
    ) -> Result<MaterialCategory, ServiceError> {
        let mut category = self.repos.categories.get(category_id).await?;
        let old_parent_id = category.parent_id;

        let mut index = self.category_index().await?;
        if let Err(e) = index.reparent(category_id, new_parent_id, self.rules.max_category_depth) {
            warn!(%category_id, error = %e, "Category move rejected");
            counter!("erp.categories.move_rejected", 1);
            return Err(e.into());
        }

        category.parent_id = new_parent_id;
        let updated = self.repos.categories.update(category, ctx).await?;

        counter!("erp.categories.moved", 1);
        publish(
            self.event_sender.as_ref(),
            Event::CategoryMoved {
                category_id,
                old_parent_id,
                new_parent_id,
            },
        )
        .await;
        info!(%category_id, "Material category moved");
        Ok(updated)
    }

    /// Soft-deletes a category that has no child categories and no materials
    #[instrument(skip(self))]
    pub async fn delete_category(
        &self,
        category_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), ServiceError> {
        // Only leaves come out of the tree.
        self.category_index().await?.remove(category_id)?;

        let in_use = self
            .repos
            .materials
            .all_active()
            .await?
            .iter()
            .any(|m| m.category_id == Some(category_id));
        if in_use {
            return Err(ServiceError::Conflict(format!(
                "Category {} is still assigned to materials",
                category_id
            )));
        }

        self.repos.categories.soft_delete(category_id, ctx).await?;

        counter!("erp.categories.deleted", 1);
        publish(self.event_sender.as_ref(), Event::CategoryDeleted(category_id)).await;
        info!(%category_id, "Material category deleted");
        Ok(())
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<MaterialCategory, ServiceError> {
        self.repos.categories.get(category_id).await
    }

    /// Category codes from the root down to `category_id`
    #[instrument(skip(self))]
    pub async fn category_path(&self, category_id: Uuid) -> Result<Vec<String>, ServiceError> {
        Ok(self.category_index().await?.path(category_id)?)
    }

    pub async fn list_categories(
        &self,
        query: &ListQuery,
    ) -> Result<Page<MaterialCategory>, ServiceError> {
        let query = query.normalized(self.rules.default_page_size, self.rules.max_page_size);
        self.repos.categories.list(&query).await
    }

    async fn ensure_category_usable(&self, category_id: Option<Uuid>) -> Result<(), ServiceError> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let category = self.repos.categories.get(category_id).await?;
        if !category.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "Category {} is inactive",
                category.code
            )));
        }
        Ok(())
    }

    /// Creates a material card
    #[instrument(skip(self, material), fields(code = %material.code))]
    pub async fn create_material(
        &self,
        material: Material,
        ctx: &AuditContext,
    ) -> Result<Material, ServiceError> {
        ensure_valid(&material, &validation_context(&self.rules, ctx))?;
        self.ensure_category_usable(material.category_id).await?;

        let created = self.repos.materials.insert(material, ctx).await?;

        counter!("erp.materials.created", 1);
        publish(self.event_sender.as_ref(), Event::MaterialCreated(created.id)).await;
        info!(material_id = %created.id, code = %created.code, "Material created");
        Ok(created)
    }

    #[instrument(skip(self, material), fields(material_id = %material.id))]
    pub async fn update_material(
        &self,
        material: Material,
        ctx: &AuditContext,
    ) -> Result<Material, ServiceError> {
        let stored = self.repos.materials.get(material.id).await?;
        ensure_valid(&material, &validation_context(&self.rules, ctx))?;
        if stored.category_id != material.category_id {
            self.ensure_category_usable(material.category_id).await?;
        }

        let updated = self.repos.materials.update(material, ctx).await?;

        counter!("erp.materials.updated", 1);
        publish(self.event_sender.as_ref(), Event::MaterialUpdated(updated.id)).await;
        info!(material_id = %updated.id, "Material updated");
        Ok(updated)
    }

    /// Soft-deletes a material that no live BOM uses
    #[instrument(skip(self))]
    pub async fn delete_material(
        &self,
        material_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), ServiceError> {
        self.repos.materials.get(material_id).await?;

        let used_by = self.repos.boms.all_active().await?.into_iter().find(|bom| {
            bom.product_material_id == material_id
                || bom
                    .items
                    .iter()
                    .any(|item| item.component_material_id == material_id)
        });
        if let Some(bom) = used_by {
            return Err(ServiceError::Conflict(format!(
                "Material {} is used by BOM {}",
                material_id, bom.code
            )));
        }

        self.repos.materials.soft_delete(material_id, ctx).await?;

        counter!("erp.materials.deleted", 1);
        publish(self.event_sender.as_ref(), Event::MaterialDeleted(material_id)).await;
        info!(%material_id, "Material deleted");
        Ok(())
    }

    pub async fn get_material(&self, material_id: Uuid) -> Result<Material, ServiceError> {
        self.repos.materials.get(material_id).await
    }

    pub async fn find_material_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Material>, ServiceError> {
        self.repos.materials.find_by_key("code", code).await
    }

    pub async fn list_materials(&self, query: &ListQuery) -> Result<Page<Material>, ServiceError> {
        let query = query.normalized(self.rules.default_page_size, self.rules.max_page_size);
        self.repos.materials.list(&query).await
    }
}
