use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_valid, publish, validation_context, Repositories};
use crate::audit::AuditContext;
use crate::config::RulesConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Role, User, UserRole};
use crate::repository::{assignment_key, ListQuery, Page};

/// Users, roles and the assignments between them.
#[derive(Clone)]
pub struct UserService {
    repos: Repositories,
    rules: RulesConfig,
    event_sender: Option<EventSender>,
}

impl UserService {
    pub fn new(repos: Repositories, rules: RulesConfig, event_sender: Option<EventSender>) -> Self {
        Self {
            repos,
            rules,
            event_sender,
        }
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_user(&self, user: User, ctx: &AuditContext) -> Result<User, ServiceError> {
        ensure_valid(&user, &validation_context(&self.rules, ctx))?;
        let created = self.repos.users.insert(user, ctx).await?;

        counter!("erp.users.created", 1);
        publish(self.event_sender.as_ref(), Event::UserCreated(created.id)).await;
        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update_user(&self, user: User, ctx: &AuditContext) -> Result<User, ServiceError> {
        self.repos.users.get(user.id).await?;
        ensure_valid(&user, &validation_context(&self.rules, ctx))?;
        let updated = self.repos.users.update(user, ctx).await?;

        counter!("erp.users.updated", 1);
        publish(self.event_sender.as_ref(), Event::UserUpdated(updated.id)).await;
        info!(user_id = %updated.id, "User updated");
        Ok(updated)
    }

    async fn assignments_of(
        &self,
        matches: impl Fn(&UserRole) -> bool,
    ) -> Result<Vec<UserRole>, ServiceError> {
        Ok(self
            .repos
            .user_roles
            .all_active()
            .await?
            .into_iter()
            .filter(|assignment| matches(assignment))
            .collect())
    }

    /// Soft-deletes the user together with all of their role assignments
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid, ctx: &AuditContext) -> Result<(), ServiceError> {
        self.repos.users.get(user_id).await?;

        for assignment in self.assignments_of(|a| a.user_id == user_id).await? {
            self.repos.user_roles.soft_delete(assignment.id, ctx).await?;
            publish(
                self.event_sender.as_ref(),
                Event::RoleRevoked {
                    user_id,
                    role_id: assignment.role_id,
                },
            )
            .await;
        }
        self.repos.users.soft_delete(user_id, ctx).await?;

        counter!("erp.users.deleted", 1);
        publish(self.event_sender.as_ref(), Event::UserDeleted(user_id)).await;
        info!(%user_id, "User deleted");
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.repos.users.get(user_id).await
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, ServiceError> {
        self.repos.users.find_by_key("username", username).await
    }

    pub async fn list_users(&self, query: &ListQuery) -> Result<Page<User>, ServiceError> {
        let query = query.normalized(self.rules.default_page_size, self.rules.max_page_size);
        self.repos.users.list(&query).await
    }

    #[instrument(skip(self, role), fields(name = %role.name))]
    pub async fn create_role(&self, role: Role, ctx: &AuditContext) -> Result<Role, ServiceError> {
        ensure_valid(&role, &validation_context(&self.rules, ctx))?;
        let created = self.repos.roles.insert(role, ctx).await?;

        counter!("erp.roles.created", 1);
        publish(self.event_sender.as_ref(), Event::RoleCreated(created.id)).await;
        info!(role_id = %created.id, "Role created");
        Ok(created)
    }

    #[instrument(skip(self, role), fields(role_id = %role.id))]
    pub async fn update_role(&self, role: Role, ctx: &AuditContext) -> Result<Role, ServiceError> {
        self.repos.roles.get(role.id).await?;
        ensure_valid(&role, &validation_context(&self.rules, ctx))?;
        let updated = self.repos.roles.update(role, ctx).await?;

        publish(self.event_sender.as_ref(), Event::RoleUpdated(updated.id)).await;
        info!(role_id = %updated.id, "Role updated");
        Ok(updated)
    }

    /// Soft-deletes a role nobody currently holds
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role_id: Uuid, ctx: &AuditContext) -> Result<(), ServiceError> {
        let role = self.repos.roles.get(role_id).await?;

        let holders = self
            .assignments_of(|a| a.role_id == role_id && a.is_effective_at(ctx.now))
            .await?;
        if !holders.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Role {} is still assigned to {} user(s)",
                role.name,
                holders.len()
            )));
        }

        self.repos.roles.soft_delete(role_id, ctx).await?;

        counter!("erp.roles.deleted", 1);
        publish(self.event_sender.as_ref(), Event::RoleDeleted(role_id)).await;
        info!(%role_id, "Role deleted");
        Ok(())
    }

    /// Grants `role_id` to `user_id` from `ctx.now`, optionally until
    /// `expires_at`. An expired earlier grant of the same pair is replaced.
    #[instrument(skip(self))]
    pub async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        ctx: &AuditContext,
    ) -> Result<UserRole, ServiceError> {
        let user = self.repos.users.get(user_id).await?;
        if !user.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "User {} is inactive",
                user.username
            )));
        }
        let role = self.repos.roles.get(role_id).await?;
        if !role.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "Role {} is inactive",
                role.name
            )));
        }

        let mut assignment = UserRole::new(user_id, role_id, ctx.now);
        assignment.assigned_by_user_id = ctx.user_id;
        assignment.expires_at = expires_at;
        ensure_valid(&assignment, &validation_context(&self.rules, ctx))?;

        let key = assignment_key(user_id, role_id);
        if let Some(existing) = self.repos.user_roles.find_by_key("assignment", &key).await? {
            if existing.is_effective_at(ctx.now) {
                return Err(ServiceError::Conflict(format!(
                    "User {} already holds role {}",
                    user.username, role.name
                )));
            }
            self.repos.user_roles.soft_delete(existing.id, ctx).await?;
        }

        let created = self.repos.user_roles.insert(assignment, ctx).await?;

        counter!("erp.roles.assigned", 1);
        publish(
            self.event_sender.as_ref(),
            Event::RoleAssigned { user_id, role_id },
        )
        .await;
        info!(%user_id, %role_id, "Role assigned");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn revoke_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        ctx: &AuditContext,
    ) -> Result<(), ServiceError> {
        let key = assignment_key(user_id, role_id);
        let assignment = self
            .repos
            .user_roles
            .find_by_key("assignment", &key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Role assignment {} not found", key)))?;

        self.repos.user_roles.soft_delete(assignment.id, ctx).await?;

        counter!("erp.roles.revoked", 1);
        publish(
            self.event_sender.as_ref(),
            Event::RoleRevoked { user_id, role_id },
        )
        .await;
        info!(%user_id, %role_id, "Role revoked");
        Ok(())
    }

    /// Active roles the user holds at `at`, sorted by name
    pub async fn effective_roles(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Role>, ServiceError> {
        let mut roles = Vec::new();
        for assignment in self
            .assignments_of(|a| a.user_id == user_id && a.is_effective_at(at))
            .await?
        {
            if let Some(role) = self.repos.roles.find(assignment.role_id).await? {
                if role.is_active {
                    roles.push(role);
                }
            }
        }
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}
